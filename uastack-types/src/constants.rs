// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Limits used as defaults by the codec and the stack.

/// Default maximum size of a message in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
/// Default maximum number of chunks in a message.
pub const MAX_CHUNK_COUNT: usize = 4096;
/// Default maximum length in bytes of a string.
pub const MAX_STRING_LENGTH: usize = 65535;
/// Default maximum length in bytes of a byte string.
pub const MAX_BYTE_STRING_LENGTH: usize = 65535;
/// Default maximum number of elements in an array.
pub const MAX_ARRAY_LENGTH: usize = 65535;
/// Default maximum decoding depth of recursive structures, i.e. nested
/// variants and extension objects.
pub const MAX_DECODING_DEPTH: u64 = 10;
/// Maximum length in bytes of a certificate in a security header.
pub const MAX_CERTIFICATE_LENGTH: usize = 32768;
/// URI of namespace index 0.
pub const CORE_NAMESPACE: &str = "http://opcfoundation.org/UA/";
