// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Implementation of [ChunkInfo], wrapping the various headers of a chunk to provide a
//! common source of info about it.

use std::io::Cursor;

use uastack_types::{EncodingResult, SimpleBinaryDecodable};

use super::{
    message_chunk::{MessageChunk, MessageChunkHeader},
    secure_channel::SecureChannel,
    security_header::{SecurityHeader, SequenceHeader},
};

/// Offsets into a chunk and its parsed headers. The chunk MUST be decrypted before
/// calling this, otherwise the sequence header and the offsets past it are garbage.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkInfo {
    /// Message header.
    pub message_header: MessageChunkHeader,
    /// Chunks either have an asymmetric or symmetric security header.
    pub security_header: SecurityHeader,
    /// Sequence header information.
    pub sequence_header: SequenceHeader,
    /// Byte offset to the security header.
    pub security_header_offset: usize,
    /// Byte offset to the sequence header.
    pub sequence_header_offset: usize,
    /// Byte offset to the actual message body.
    pub body_offset: usize,
    /// Length of the message body.
    pub body_length: usize,
}

impl ChunkInfo {
    /// Parse the chunk's headers and compute the body range.
    pub fn new(chunk: &MessageChunk, secure_channel: &SecureChannel) -> EncodingResult<ChunkInfo> {
        let mut stream = Cursor::new(&chunk.data);

        let decoding_options = secure_channel.decoding_options();

        let message_header = MessageChunkHeader::decode(&mut stream, &decoding_options)?;

        let security_header_offset = stream.position() as usize;
        let security_header = SecurityHeader::decode_from_stream(
            &mut stream,
            message_header.message_type.is_open_secure_channel(),
            &decoding_options,
        )?;

        let sequence_header_offset = stream.position() as usize;
        let sequence_header = SequenceHeader::decode(&mut stream, &decoding_options)?;

        // All of what follows is the message body
        let body_offset = stream.position() as usize;
        let body_length = chunk.data.len() - body_offset;

        Ok(ChunkInfo {
            message_header,
            security_header,
            sequence_header,
            security_header_offset,
            sequence_header_offset,
            body_offset,
            body_length,
        })
    }
}
