// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Asymmetric key wrappers over RSA, covering the signature schemes and encryption
//! paddings required by the supported security policies.

use std::path::Path;

use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    traits::PublicKeyParts,
    Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey,
};
use sha1::{Digest, Sha1};
use sha2::Sha256;

use uastack_types::{Error, StatusCode};

/// The padding scheme applied to RSA encryption.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RsaPadding {
    /// PKCS#1 v1.5.
    Pkcs1,
    /// OAEP with SHA-1 for both digest and MGF1.
    OaepSha1,
    /// OAEP with SHA-256 for both digest and MGF1.
    OaepSha256,
}

impl RsaPadding {
    /// Bytes of overhead the padding scheme adds to each plain text block.
    pub fn overhead(&self) -> usize {
        match self {
            RsaPadding::Pkcs1 => 11,
            RsaPadding::OaepSha1 => 42,
            RsaPadding::OaepSha256 => 66,
        }
    }
}

/// Block size arithmetic shared by public and private keys.
pub trait KeySize {
    /// The key size in bytes, which is also the cipher text block size.
    fn size(&self) -> usize;

    /// The number of plain text bytes that fit into one encrypted block.
    fn plain_text_block_size(&self, padding: RsaPadding) -> usize {
        self.size() - padding.overhead()
    }

    /// The size of one encrypted block.
    fn cipher_text_block_size(&self) -> usize {
        self.size()
    }

    /// The total encrypted size of `data_size` plain text bytes.
    fn calculate_cipher_text_size(&self, data_size: usize, padding: RsaPadding) -> usize {
        let block_size = self.plain_text_block_size(padding);
        data_size.div_ceil(block_size) * self.cipher_text_block_size()
    }
}

fn crypto_error(context: impl std::fmt::Display) -> Error {
    Error::new(StatusCode::BadSecurityChecksFailed, context.to_string())
}

/// An RSA private key.
#[derive(Debug, Clone)]
pub struct PrivateKey {
    key: RsaPrivateKey,
}

impl KeySize for PrivateKey {
    fn size(&self) -> usize {
        self.key.size()
    }
}

impl PrivateKey {
    /// Wrap an RSA private key.
    pub fn new(key: RsaPrivateKey) -> PrivateKey {
        PrivateKey { key }
    }

    /// Load a private key from PEM text, either PKCS#8 or PKCS#1.
    pub fn from_pem(pem: &str) -> Result<PrivateKey, Error> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map(PrivateKey::new)
            .map_err(|e| crypto_error(format!("Cannot parse private key from pem: {e}")))
    }

    /// Load a private key from a PEM file.
    pub fn read_pem_file(path: &Path) -> Result<PrivateKey, Error> {
        let pem = std::fs::read_to_string(path)
            .map_err(|e| crypto_error(format!("Cannot read private key file: {e}")))?;
        Self::from_pem(&pem)
    }

    /// The public half of this key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            key: self.key.to_public_key(),
        }
    }

    /// Sign the data with RSA PKCS#1 v1.5 over a SHA-1 digest.
    pub fn sign_sha1(&self, data: &[u8], signature: &mut [u8]) -> Result<usize, Error> {
        let digest = Sha1::digest(data);
        let sig = self
            .key
            .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
            .map_err(crypto_error)?;
        signature[..sig.len()].copy_from_slice(&sig);
        Ok(sig.len())
    }

    /// Sign the data with RSA PKCS#1 v1.5 over a SHA-256 digest.
    pub fn sign_sha256(&self, data: &[u8], signature: &mut [u8]) -> Result<usize, Error> {
        let digest = Sha256::digest(data);
        let sig = self
            .key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(crypto_error)?;
        signature[..sig.len()].copy_from_slice(&sig);
        Ok(sig.len())
    }

    /// Sign the data with RSA-PSS over a SHA-256 digest.
    pub fn sign_sha256_pss(&self, data: &[u8], signature: &mut [u8]) -> Result<usize, Error> {
        let digest = Sha256::digest(data);
        let mut rng = rand::thread_rng();
        let sig = self
            .key
            .sign_with_rng(&mut rng, Pss::new::<Sha256>(), &digest)
            .map_err(crypto_error)?;
        signature[..sig.len()].copy_from_slice(&sig);
        Ok(sig.len())
    }

    /// Decrypt `src`, a sequence of whole cipher text blocks, into `dst`.
    /// Returns the number of plain text bytes.
    pub fn decrypt(&self, src: &[u8], dst: &mut [u8], padding: RsaPadding) -> Result<usize, Error> {
        let cipher_block_size = self.cipher_text_block_size();
        if src.len() % cipher_block_size != 0 {
            return Err(crypto_error(format!(
                "Encrypted data length {} is not a multiple of the cipher block size {}",
                src.len(),
                cipher_block_size
            )));
        }
        let mut dst_offset = 0;
        for block in src.chunks(cipher_block_size) {
            let plain = match padding {
                RsaPadding::Pkcs1 => self.key.decrypt(Pkcs1v15Encrypt, block),
                RsaPadding::OaepSha1 => self.key.decrypt(Oaep::new::<Sha1>(), block),
                RsaPadding::OaepSha256 => self.key.decrypt(Oaep::new::<Sha256>(), block),
            }
            .map_err(crypto_error)?;
            dst[dst_offset..dst_offset + plain.len()].copy_from_slice(&plain);
            dst_offset += plain.len();
        }
        Ok(dst_offset)
    }
}

/// An RSA public key.
#[derive(Debug, Clone)]
pub struct PublicKey {
    key: RsaPublicKey,
}

impl KeySize for PublicKey {
    fn size(&self) -> usize {
        self.key.size()
    }
}

impl PublicKey {
    /// Wrap an RSA public key.
    pub fn new(key: RsaPublicKey) -> PublicKey {
        PublicKey { key }
    }

    /// Parse a public key from a DER encoded SubjectPublicKeyInfo.
    pub fn from_spki_der(der: &[u8]) -> Result<PublicKey, Error> {
        RsaPublicKey::from_public_key_der(der)
            .map(PublicKey::new)
            .map_err(|e| crypto_error(format!("Cannot parse public key: {e}")))
    }

    /// Verify an RSA PKCS#1 v1.5 signature over a SHA-1 digest.
    pub fn verify_sha1(&self, data: &[u8], signature: &[u8]) -> bool {
        let digest = Sha1::digest(data);
        self.key
            .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, signature)
            .is_ok()
    }

    /// Verify an RSA PKCS#1 v1.5 signature over a SHA-256 digest.
    pub fn verify_sha256(&self, data: &[u8], signature: &[u8]) -> bool {
        let digest = Sha256::digest(data);
        self.key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            .is_ok()
    }

    /// Verify an RSA-PSS signature over a SHA-256 digest.
    pub fn verify_sha256_pss(&self, data: &[u8], signature: &[u8]) -> bool {
        let digest = Sha256::digest(data);
        self.key
            .verify(Pss::new::<Sha256>(), &digest, signature)
            .is_ok()
    }

    /// Encrypt `src` into `dst` one plain text block at a time.
    /// Returns the number of cipher text bytes.
    pub fn encrypt(&self, src: &[u8], dst: &mut [u8], padding: RsaPadding) -> Result<usize, Error> {
        let plain_block_size = self.plain_text_block_size(padding);
        let cipher_block_size = self.cipher_text_block_size();
        let mut rng = rand::thread_rng();
        let mut dst_offset = 0;
        for block in src.chunks(plain_block_size) {
            let cipher = match padding {
                RsaPadding::Pkcs1 => self.key.encrypt(&mut rng, Pkcs1v15Encrypt, block),
                RsaPadding::OaepSha1 => self.key.encrypt(&mut rng, Oaep::new::<Sha1>(), block),
                RsaPadding::OaepSha256 => self.key.encrypt(&mut rng, Oaep::new::<Sha256>(), block),
            }
            .map_err(crypto_error)?;
            if cipher.len() != cipher_block_size {
                return Err(crypto_error(format!(
                    "Cipher block is {} bytes, expected {}",
                    cipher.len(),
                    cipher_block_size
                )));
            }
            dst[dst_offset..dst_offset + cipher.len()].copy_from_slice(&cipher);
            dst_offset += cipher.len();
        }
        Ok(dst_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> PrivateKey {
        let mut rng = rand::thread_rng();
        PrivateKey::new(RsaPrivateKey::new(&mut rng, 2048).unwrap())
    }

    #[test]
    fn sign_verify() {
        let key = test_key();
        let public = key.public_key();
        let data = b"some signed message";
        let mut signature = vec![0u8; key.size()];
        key.sign_sha256(data, &mut signature).unwrap();
        assert!(public.verify_sha256(data, &signature));
        assert!(!public.verify_sha256(b"other message", &signature));
        assert!(!public.verify_sha1(data, &signature));
    }

    #[test]
    fn encrypt_decrypt_multi_block() {
        let key = test_key();
        let public = key.public_key();
        let padding = RsaPadding::OaepSha1;
        // Three blocks worth of data.
        let src = vec![7u8; public.plain_text_block_size(padding) * 2 + 17];
        let mut encrypted = vec![0u8; public.calculate_cipher_text_size(src.len(), padding)];
        let size = public.encrypt(&src, &mut encrypted, padding).unwrap();
        assert_eq!(size, encrypted.len());

        let mut decrypted = vec![0u8; size];
        let size = key.decrypt(&encrypted, &mut decrypted, padding).unwrap();
        assert_eq!(&decrypted[..size], &src[..]);
    }
}
