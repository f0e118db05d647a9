// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! A tokio codec that reads framed OPC UA TCP messages off the socket: acknowledge and
//! error messages during the handshake, message chunks afterwards.
//!
//! Frames are read strictly: exactly `message_size` bytes are buffered before decoding,
//! and a frame exceeding the configured limits tears the connection down with
//! `BadTcpMessageTooLarge`.

use std::io::Cursor;

use bytes::{Buf, BytesMut};
use log::error;
use tokio_util::codec::Decoder;

use uastack_types::{DecodingOptions, SimpleBinaryDecodable, StatusCode};

use super::{
    message_chunk::MessageChunk,
    tcp_types::{AcknowledgeMessage, ErrorMessage, MessageType, MESSAGE_HEADER_SIZE},
};

/// A decoded frame from the socket.
#[derive(Debug)]
pub enum Message {
    /// An acknowledge to our hello.
    Acknowledge(AcknowledgeMessage),
    /// An error message; the connection is about to die.
    Error(ErrorMessage),
    /// A message chunk.
    Chunk(MessageChunk),
}

/// Decoder for OPC UA TCP frames.
pub struct TcpCodec {
    decoding_options: DecodingOptions,
}

impl TcpCodec {
    /// Create a codec with the given limits.
    pub fn new(decoding_options: DecodingOptions) -> TcpCodec {
        TcpCodec { decoding_options }
    }
}

impl Decoder for TcpCodec {
    type Item = Message;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < MESSAGE_HEADER_SIZE {
            return Ok(None);
        }

        let message_type = super::tcp_types::MessageHeader::message_type(&buf[0..3]);
        if message_type == MessageType::Invalid || message_type == MessageType::Hello {
            error!(
                "Invalid message type code {:?} received from server",
                &buf[0..3]
            );
            return Err(StatusCode::BadTcpMessageTypeInvalid.into());
        }

        let message_size = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
        if message_size < MESSAGE_HEADER_SIZE {
            error!("Message size {} is less than the header size", message_size);
            return Err(StatusCode::BadTcpInternalError.into());
        }
        // Reject before buffering so an oversized frame can never consume memory.
        if self.decoding_options.max_message_size > 0
            && message_size > self.decoding_options.max_message_size
        {
            error!(
                "Message size {} exceeds max message size {}",
                message_size, self.decoding_options.max_message_size
            );
            return Err(StatusCode::BadTcpMessageTooLarge.into());
        }

        if buf.len() < message_size {
            // Wait for exactly message_size bytes.
            buf.reserve(message_size - buf.len());
            return Ok(None);
        }

        let frame = buf.copy_to_bytes(message_size);
        let mut stream = Cursor::new(&frame[..]);
        let message = match message_type {
            MessageType::Acknowledge => Message::Acknowledge(
                AcknowledgeMessage::decode(&mut stream, &self.decoding_options)
                    .map_err(std::io::Error::from)?,
            ),
            MessageType::Error => Message::Error(
                ErrorMessage::decode(&mut stream, &self.decoding_options)
                    .map_err(std::io::Error::from)?,
            ),
            MessageType::Chunk => Message::Chunk(
                MessageChunk::decode(&mut stream, &self.decoding_options)
                    .map_err(std::io::Error::from)?,
            ),
            // Excluded above.
            MessageType::Hello | MessageType::Invalid => unreachable!(),
        };
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uastack_types::SimpleBinaryEncodable;

    #[test]
    fn partial_frame_waits() {
        let mut codec = TcpCodec::new(DecodingOptions::test());
        let msg = ErrorMessage::from_status_code(StatusCode::BadTcpServerTooBusy);
        let bytes = msg.encode_to_vec();

        let mut buf = BytesMut::from(&bytes[..6]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&bytes[6..]);
        let Some(Message::Error(decoded)) = codec.decode(&mut buf).unwrap() else {
            panic!("expected error message");
        };
        assert_eq!(decoded.status_code(), StatusCode::BadTcpServerTooBusy);
    }

    #[test]
    fn oversized_frame_rejected() {
        let options = DecodingOptions {
            max_message_size: 1024,
            ..Default::default()
        };
        let mut codec = TcpCodec::new(options);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"MSGF");
        buf.extend_from_slice(&(1_000_000u32).to_le_bytes());
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn hello_from_server_rejected() {
        let mut codec = TcpCodec::new(DecodingOptions::test());
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"HELF");
        buf.extend_from_slice(&(8u32).to_le_bytes());
        assert!(codec.decode(&mut buf).is_err());
    }
}
