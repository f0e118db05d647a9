// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Transport framing and the secure channel conversation shared by everything that
//! speaks OPC UA TCP binary: HEL/ACK/ERR handshake types, message chunking with
//! per-chunk signing and encryption, and the request/response message enums.

#![warn(missing_docs)]

pub mod comms;
pub mod constants;
pub mod messages;

pub mod sync;

pub use messages::{Message, MessageType, RequestMessage, ResponseMessage};

mod debug {
    use log::trace;

    /// Log a buffer at trace level, for debugging crypto and framing problems.
    pub fn log_buffer(message: &str, buf: &[u8]) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        trace!("{} ({} bytes)", message, buf.len());
        for chunk in buf.chunks(16) {
            let hex = chunk
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");
            trace!("  {}", hex);
        }
    }
}

pub(crate) use debug::log_buffer;
