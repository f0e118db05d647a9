// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Hash and HMAC functions, including the P_SHA pseudo-random function used to derive
//! the symmetric keys of a secure channel from the exchanged nonces.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

use uastack_types::{Error, StatusCode};

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Digest size of SHA-1 in bytes.
pub const SHA1_SIZE: usize = 20;
/// Digest size of SHA-256 in bytes.
pub const SHA256_SIZE: usize = 32;

macro_rules! p_sha {
    ($name:ident, $hmac:ident, $digest_size:expr) => {
        /// The P_SHA pseudo-random function from TLS, as specified by OPC UA Part 6 6.7.5:
        ///
        /// ```text
        /// P_SHA(secret, seed) = HMAC(secret, A(1) + seed) + HMAC(secret, A(2) + seed) + ...
        /// ```
        ///
        /// where `A(0) = seed` and `A(n) = HMAC(secret, A(n-1))`.
        pub fn $name(secret: &[u8], seed: &[u8], length: usize) -> Vec<u8> {
            let mut result = Vec::with_capacity(length + $digest_size);
            // A(1)
            let mut a = hmac_round_inner::<$hmac>(secret, &[seed]);
            while result.len() < length {
                result.extend_from_slice(&hmac_round_inner::<$hmac>(secret, &[&a, seed]));
                a = hmac_round_inner::<$hmac>(secret, &[&a]);
            }
            result.truncate(length);
            result
        }
    };
}

p_sha!(p_sha1, HmacSha1, SHA1_SIZE);
p_sha!(p_sha256, HmacSha256, SHA256_SIZE);

fn hmac_round_inner<M: Mac + hmac::digest::KeyInit>(key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut mac = <M as Mac>::new_from_slice(key).expect("HMAC accepts keys of any size");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().to_vec()
}

/// Compute the HMAC-SHA1 of the data into `signature`.
pub fn hmac_sha1(key: &[u8], data: &[u8], signature: &mut [u8]) -> Result<(), Error> {
    if signature.len() != SHA1_SIZE {
        return Err(Error::new(
            StatusCode::BadSecurityChecksFailed,
            format!("Signature buffer is {} bytes, expected 20", signature.len()),
        ));
    }
    signature.copy_from_slice(&hmac_round_inner::<HmacSha1>(key, &[data]));
    Ok(())
}

/// Verify the HMAC-SHA1 of the data against `signature`.
pub fn verify_hmac_sha1(key: &[u8], data: &[u8], signature: &[u8]) -> bool {
    let mut mac = match <HmacSha1 as Mac>::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(data);
    mac.verify_slice(signature).is_ok()
}

/// Compute the HMAC-SHA256 of the data into `signature`.
pub fn hmac_sha256(key: &[u8], data: &[u8], signature: &mut [u8]) -> Result<(), Error> {
    if signature.len() != SHA256_SIZE {
        return Err(Error::new(
            StatusCode::BadSecurityChecksFailed,
            format!("Signature buffer is {} bytes, expected 32", signature.len()),
        ));
    }
    signature.copy_from_slice(&hmac_round_inner::<HmacSha256>(key, &[data]));
    Ok(())
}

/// Verify the HMAC-SHA256 of the data against `signature`.
pub fn verify_hmac_sha256(key: &[u8], data: &[u8], signature: &[u8]) -> bool {
    let mut mac = match <HmacSha256 as Mac>::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(data);
    mac.verify_slice(signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p_sha1_is_deterministic_and_sized() {
        let secret = b"server nonce bytes";
        let seed = b"client nonce bytes";
        let a = p_sha1(secret, seed, 52);
        let b = p_sha1(secret, seed, 52);
        assert_eq!(a.len(), 52);
        assert_eq!(a, b);
        // A prefix of a longer derivation is the shorter derivation.
        let c = p_sha1(secret, seed, 16);
        assert_eq!(&a[..16], &c[..]);
    }

    #[test]
    fn hmac_sign_verify() {
        let key = [7u8; 32];
        let data = b"signed content";
        let mut signature = [0u8; SHA256_SIZE];
        hmac_sha256(&key, data, &mut signature).unwrap();
        assert!(verify_hmac_sha256(&key, data, &signature));
        assert!(!verify_hmac_sha256(&key, b"tampered content", &signature));
    }
}
