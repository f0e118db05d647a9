// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! The SHA-1 thumbprint of a DER encoded certificate, used to identify certificates in
//! asymmetric security headers and the certificate store.

use sha1::{Digest, Sha1};

use uastack_types::ByteString;

/// The thumbprint of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbprint {
    value: [u8; Thumbprint::THUMBPRINT_SIZE],
}

impl Thumbprint {
    /// Size in bytes of a SHA-1 thumbprint.
    pub const THUMBPRINT_SIZE: usize = 20;

    /// Compute the thumbprint of a DER encoded certificate.
    pub fn new(der: &[u8]) -> Thumbprint {
        let digest = Sha1::digest(der);
        let mut value = [0u8; Self::THUMBPRINT_SIZE];
        value.copy_from_slice(&digest);
        Thumbprint { value }
    }

    /// The raw thumbprint bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The thumbprint as a byte string, as it is carried in security headers.
    pub fn as_byte_string(&self) -> ByteString {
        ByteString::from(&self.value)
    }

    /// The thumbprint as a hex string, used for file names in the certificate store.
    pub fn as_hex_string(&self) -> String {
        let mut hex = String::with_capacity(self.value.len() * 2);
        for b in &self.value {
            hex.push_str(&format!("{:02x}", b));
        }
        hex
    }
}
