// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Transport and secure channel communications: TCP framing, message chunks, the
//! chunker and the secure channel itself.

pub mod buffer;
pub mod chunker;
pub mod message_chunk;
pub mod message_chunk_info;
pub mod secure_channel;
pub mod security_header;
pub mod tcp_codec;
pub mod tcp_types;
pub mod url;
