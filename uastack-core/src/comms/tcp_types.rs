// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Types for the OPC UA TCP handshake: hello, acknowledge and error messages, and the
//! message header every frame on the socket starts with.

use std::io::{Read, Write};

use uastack_types::{
    process_decode_io_result, read_u32, read_u8, write_u32, write_u8, DecodingOptions,
    EncodingResult, Error, SimpleBinaryDecodable, SimpleBinaryEncodable, StatusCode, UAString,
};

use crate::constants::{MIN_BUFFER_SIZE, PROTOCOL_VERSION};

/// Message type code for hello messages.
pub const HELLO_MESSAGE: &[u8] = b"HEL";
/// Message type code for acknowledge messages.
pub const ACKNOWLEDGE_MESSAGE: &[u8] = b"ACK";
/// Message type code for error messages.
pub const ERROR_MESSAGE: &[u8] = b"ERR";
/// Message type code for regular service message chunks.
pub const CHUNK_MESSAGE: &[u8] = b"MSG";
/// Message type code for open secure channel chunks.
pub const OPEN_SECURE_CHANNEL_MESSAGE: &[u8] = b"OPN";
/// Message type code for close secure channel chunks.
pub const CLOSE_SECURE_CHANNEL_MESSAGE: &[u8] = b"CLO";

/// Chunk type byte of an intermediate chunk.
pub const CHUNK_INTERMEDIATE: u8 = b'C';
/// Chunk type byte of the final chunk of a message.
pub const CHUNK_FINAL: u8 = b'F';
/// Chunk type byte of a final chunk that aborts the message.
pub const CHUNK_FINAL_ERROR: u8 = b'A';

/// Size in bytes of every message header: 3 bytes type, 1 byte chunk type, 4 bytes size.
pub const MESSAGE_HEADER_SIZE: usize = 8;

/// Upper bound on the endpoint URL length in a hello message, from Part 6.
const MAX_ENDPOINT_URL_LENGTH: usize = 4096;

/// The type of a frame on the socket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageType {
    /// Invalid message type.
    Invalid,
    /// A hello message.
    Hello,
    /// An acknowledge message.
    Acknowledge,
    /// An error message.
    Error,
    /// A message chunk, MSG, OPN or CLO.
    Chunk,
}

/// The header every frame on the socket starts with. The message size includes the
/// eight header bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    /// The type of the frame.
    pub message_type: MessageType,
    /// The size of the frame including this header.
    pub message_size: u32,
}

impl SimpleBinaryEncodable for MessageHeader {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_SIZE
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let message_type: &[u8] = match self.message_type {
            MessageType::Hello => HELLO_MESSAGE,
            MessageType::Acknowledge => ACKNOWLEDGE_MESSAGE,
            MessageType::Error => ERROR_MESSAGE,
            _ => {
                return Err(Error::encoding(
                    "Cannot encode message header with an invalid message type",
                ));
            }
        };
        stream.write_all(message_type).map_err(Error::encoding)?;
        write_u8(stream, CHUNK_FINAL)?;
        write_u32(stream, self.message_size)
    }
}

impl SimpleBinaryDecodable for MessageHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let mut message_type_code = [0u8; 3];
        process_decode_io_result(stream.read_exact(&mut message_type_code))?;
        let message_type = MessageHeader::message_type(&message_type_code);
        if message_type == MessageType::Invalid {
            return Err(Error::decoding(format!(
                "Invalid message type code {:?}",
                message_type_code
            )));
        }
        let chunk_type = read_u8(stream)?;
        if message_type != MessageType::Chunk && chunk_type != CHUNK_FINAL {
            return Err(Error::decoding(format!(
                "Invalid chunk type {} for message type {:?}",
                chunk_type, message_type
            )));
        }
        let message_size = read_u32(stream)?;
        Ok(MessageHeader {
            message_type,
            message_size,
        })
    }
}

impl MessageHeader {
    /// Classify the three byte message type code.
    pub fn message_type(t: &[u8]) -> MessageType {
        match t {
            HELLO_MESSAGE => MessageType::Hello,
            ACKNOWLEDGE_MESSAGE => MessageType::Acknowledge,
            ERROR_MESSAGE => MessageType::Error,
            CHUNK_MESSAGE | OPEN_SECURE_CHANNEL_MESSAGE | CLOSE_SECURE_CHANNEL_MESSAGE => {
                MessageType::Chunk
            }
            _ => MessageType::Invalid,
        }
    }
}

/// The hello message sent by the client immediately after the TCP connection opens.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    /// The message header.
    pub message_header: MessageHeader,
    /// The version of the OPC UA TCP protocol the client speaks.
    pub protocol_version: u32,
    /// The largest frame the client is able to receive.
    pub receive_buffer_size: u32,
    /// The largest frame the client will send.
    pub send_buffer_size: u32,
    /// The largest logical message the client accepts, 0 for no limit.
    pub max_message_size: u32,
    /// The largest number of chunks per message the client accepts, 0 for no limit.
    pub max_chunk_count: u32,
    /// The url of the endpoint the client wants to talk to.
    pub endpoint_url: UAString,
}

impl SimpleBinaryEncodable for HelloMessage {
    fn byte_len(&self) -> usize {
        self.message_header.byte_len() + 20 + self.endpoint_url.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        self.protocol_version.encode(stream)?;
        self.receive_buffer_size.encode(stream)?;
        self.send_buffer_size.encode(stream)?;
        self.max_message_size.encode(stream)?;
        self.max_chunk_count.encode(stream)?;
        self.endpoint_url.encode(stream)
    }
}

impl SimpleBinaryDecodable for HelloMessage {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let message_header = MessageHeader::decode(stream, decoding_options)?;
        let protocol_version = u32::decode(stream, decoding_options)?;
        let receive_buffer_size = u32::decode(stream, decoding_options)?;
        let send_buffer_size = u32::decode(stream, decoding_options)?;
        let max_message_size = u32::decode(stream, decoding_options)?;
        let max_chunk_count = u32::decode(stream, decoding_options)?;
        let endpoint_url = UAString::decode(stream, decoding_options)?;
        Ok(HelloMessage {
            message_header,
            protocol_version,
            receive_buffer_size,
            send_buffer_size,
            max_message_size,
            max_chunk_count,
            endpoint_url,
        })
    }
}

impl HelloMessage {
    /// Create a hello message for the given endpoint and local limits.
    pub fn new(
        endpoint_url: &str,
        send_buffer_size: usize,
        receive_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) -> HelloMessage {
        let mut msg = HelloMessage {
            message_header: MessageHeader {
                message_type: MessageType::Hello,
                message_size: 0,
            },
            protocol_version: PROTOCOL_VERSION,
            receive_buffer_size: receive_buffer_size as u32,
            send_buffer_size: send_buffer_size as u32,
            max_message_size: max_message_size as u32,
            max_chunk_count: max_chunk_count as u32,
            endpoint_url: UAString::from(endpoint_url),
        };
        msg.message_header.message_size = msg.byte_len() as u32;
        msg
    }

    /// Check the endpoint url is within the length the protocol allows.
    pub fn is_endpoint_url_valid(&self) -> bool {
        self.endpoint_url.len() <= MAX_ENDPOINT_URL_LENGTH as isize
    }

    /// Check the advertised buffer sizes against the minimums the protocol requires.
    pub fn is_valid_buffer_sizes(&self) -> bool {
        self.receive_buffer_size as usize >= MIN_BUFFER_SIZE
            && self.send_buffer_size as usize >= MIN_BUFFER_SIZE
    }
}

/// The acknowledge message a server responds to a hello with, carrying the server's
/// limits. The negotiated limits are the element-wise minimum of the two.
#[derive(Debug, Clone, PartialEq)]
pub struct AcknowledgeMessage {
    /// The message header.
    pub message_header: MessageHeader,
    /// The version of the OPC UA TCP protocol the server speaks.
    pub protocol_version: u32,
    /// The largest frame the server is able to receive.
    pub receive_buffer_size: u32,
    /// The largest frame the server will send.
    pub send_buffer_size: u32,
    /// The largest logical message the server accepts, 0 for no limit.
    pub max_message_size: u32,
    /// The largest number of chunks per message the server accepts, 0 for no limit.
    pub max_chunk_count: u32,
}

impl SimpleBinaryEncodable for AcknowledgeMessage {
    fn byte_len(&self) -> usize {
        self.message_header.byte_len() + 20
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        self.protocol_version.encode(stream)?;
        self.receive_buffer_size.encode(stream)?;
        self.send_buffer_size.encode(stream)?;
        self.max_message_size.encode(stream)?;
        self.max_chunk_count.encode(stream)
    }
}

impl SimpleBinaryDecodable for AcknowledgeMessage {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let message_header = MessageHeader::decode(stream, decoding_options)?;
        let protocol_version = u32::decode(stream, decoding_options)?;
        let receive_buffer_size = u32::decode(stream, decoding_options)?;
        let send_buffer_size = u32::decode(stream, decoding_options)?;
        let max_message_size = u32::decode(stream, decoding_options)?;
        let max_chunk_count = u32::decode(stream, decoding_options)?;
        Ok(AcknowledgeMessage {
            message_header,
            protocol_version,
            receive_buffer_size,
            send_buffer_size,
            max_message_size,
            max_chunk_count,
        })
    }
}

/// The error message either peer can send to terminate the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    /// The message header.
    pub message_header: MessageHeader,
    /// The error as a status code.
    pub error: u32,
    /// Human readable detail, may be empty.
    pub reason: UAString,
}

impl SimpleBinaryEncodable for ErrorMessage {
    fn byte_len(&self) -> usize {
        self.message_header.byte_len() + 4 + self.reason.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.message_header.encode(stream)?;
        self.error.encode(stream)?;
        self.reason.encode(stream)
    }
}

impl SimpleBinaryDecodable for ErrorMessage {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let message_header = MessageHeader::decode(stream, decoding_options)?;
        let error = u32::decode(stream, decoding_options)?;
        let reason = UAString::decode(stream, decoding_options)?;
        Ok(ErrorMessage {
            message_header,
            error,
            reason,
        })
    }
}

impl ErrorMessage {
    /// Create an error message from a status code.
    pub fn from_status_code(status_code: StatusCode) -> ErrorMessage {
        let mut msg = ErrorMessage {
            message_header: MessageHeader {
                message_type: MessageType::Error,
                message_size: 0,
            },
            error: status_code.bits(),
            reason: UAString::from(status_code.to_string()),
        };
        msg.message_header.message_size = msg.byte_len() as u32;
        msg
    }

    /// The error as a status code.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_raw(self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn hello_wire_form() {
        let hello = HelloMessage::new("opc.tcp://localhost:4840", 65536, 65536, 16 * 1024 * 1024, 4096);
        let buf = hello.encode_to_vec();
        // "HEL" followed by the reserved 'F'.
        assert_eq!(&buf[0..4], b"HELF");
        assert_eq!(buf.len() as u32, hello.message_header.message_size);

        let mut stream = Cursor::new(buf);
        let decoded = HelloMessage::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, hello);
        assert!(decoded.is_valid_buffer_sizes());
        assert!(decoded.is_endpoint_url_valid());
    }

    #[test]
    fn error_message_round_trip() {
        let msg = ErrorMessage::from_status_code(StatusCode::BadTcpMessageTooLarge);
        let buf = msg.encode_to_vec();
        assert_eq!(&buf[0..3], ERROR_MESSAGE);
        let mut stream = Cursor::new(buf);
        let decoded = ErrorMessage::decode(&mut stream, &DecodingOptions::test()).unwrap();
        assert_eq!(decoded.status_code(), StatusCode::BadTcpMessageTooLarge);
    }
}
