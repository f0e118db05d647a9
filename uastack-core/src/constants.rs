// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Constants for the OPC UA TCP transport.

/// The default port that OPC UA servers listen on.
pub const DEFAULT_OPC_UA_SERVER_PORT: u16 = 4840;

/// The version of the OPC UA TCP protocol this stack implements.
pub const PROTOCOL_VERSION: u32 = 0;

/// Default size in bytes of the send buffer offered in the hello message.
pub const SEND_BUFFER_SIZE: usize = 65536;
/// Default size in bytes of the receive buffer offered in the hello message.
pub const RECEIVE_BUFFER_SIZE: usize = 65536;

/// Minimum size a peer may request for either buffer. Part 6 fixes this at 8192.
pub const MIN_BUFFER_SIZE: usize = 8192;
/// Smallest usable chunk size. Chunks smaller than this cannot hold headers,
/// padding and a signature.
pub const MIN_CHUNK_SIZE: usize = 8192;

/// Default requested lifetime of a secure channel security token, in milliseconds.
pub const DEFAULT_SECURE_CHANNEL_TOKEN_LIFETIME: u32 = 3_600_000;
