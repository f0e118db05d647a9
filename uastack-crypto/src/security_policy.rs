// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Security policies and the operations they parameterize: key derivation, symmetric
//! signing and encryption, and the asymmetric algorithms used during OpenSecureChannel.

use std::{fmt, str::FromStr};

use log::error;

use uastack_types::{ByteString, Error, StatusCode};

use super::{
    aeskey::AesKey,
    hash,
    pkey::{PrivateKey, PublicKey, RsaPadding},
};

// Symmetric signature sizes.
const SHA1_SIZE: usize = hash::SHA1_SIZE;
const SHA256_SIZE: usize = hash::SHA256_SIZE;

/// URIs for the supported security policies.
pub mod uris {
    /// No security.
    pub const SECURITY_POLICY_NONE: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";
    /// Basic128Rsa15, deprecated by the standard but still widely deployed.
    pub const SECURITY_POLICY_BASIC_128_RSA_15: &str =
        "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15";
    /// Basic256, deprecated by the standard but still widely deployed.
    pub const SECURITY_POLICY_BASIC_256: &str =
        "http://opcfoundation.org/UA/SecurityPolicy#Basic256";
    /// Basic256Sha256.
    pub const SECURITY_POLICY_BASIC_256_SHA_256: &str =
        "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";
    /// Aes128-Sha256-RsaOaep.
    pub const SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP: &str =
        "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep";
    /// Aes256-Sha256-RsaPss.
    pub const SECURITY_POLICY_AES_256_SHA_256_RSA_PSS: &str =
        "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss";
}

/// Algorithm URIs referenced in signature data and identity tokens.
pub mod algorithms {
    /// RSA PKCS#1 v1.5 signature over SHA-1.
    pub const DSIG_RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
    /// RSA PKCS#1 v1.5 signature over SHA-256.
    pub const DSIG_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    /// RSA-PSS signature over SHA-256.
    pub const DSIG_RSA_PSS_SHA256: &str = "http://opcfoundation.org/UA/security/rsa-pss-sha2-256";
    /// RSA PKCS#1 v1.5 encryption.
    pub const ENC_RSA_15: &str = "http://www.w3.org/2001/04/xmlenc#rsa-1_5";
    /// RSA OAEP encryption with SHA-1.
    pub const ENC_RSA_OAEP: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep";
    /// RSA OAEP encryption with SHA-256.
    pub const ENC_RSA_OAEP_SHA256: &str = "http://opcfoundation.org/UA/security/rsa-oaep-sha2-256";
}

/// A security policy: the suite of algorithms and key sizes applied to a secure channel
/// or a user identity token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SecurityPolicy {
    /// A policy the stack does not recognize.
    Unknown,
    /// No signing, no encryption.
    None,
    /// AES-128-CBC, HMAC-SHA1, RSA PKCS#1 v1.5.
    Basic128Rsa15,
    /// AES-256-CBC, HMAC-SHA1, RSA OAEP.
    Basic256,
    /// AES-256-CBC, HMAC-SHA256, RSA OAEP.
    Basic256Sha256,
    /// AES-128-CBC, HMAC-SHA256, RSA OAEP.
    Aes128Sha256RsaOaep,
    /// AES-256-CBC, HMAC-SHA256, RSA OAEP SHA-256 and PSS signatures.
    Aes256Sha256RsaPss,
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SecurityPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" | "None" => SecurityPolicy::None,
            "Basic128Rsa15" => SecurityPolicy::Basic128Rsa15,
            "Basic256" => SecurityPolicy::Basic256,
            "Basic256Sha256" => SecurityPolicy::Basic256Sha256,
            "Aes128-Sha256-RsaOaep" => SecurityPolicy::Aes128Sha256RsaOaep,
            "Aes256-Sha256-RsaPss" => SecurityPolicy::Aes256Sha256RsaPss,
            // Accept the URI form as well.
            _ => SecurityPolicy::from_uri(s),
        })
    }
}

impl SecurityPolicy {
    /// Look up a security policy from its URI. Unrecognized URIs map to `Unknown`.
    pub fn from_uri(uri: &str) -> SecurityPolicy {
        match uri {
            uris::SECURITY_POLICY_NONE => SecurityPolicy::None,
            uris::SECURITY_POLICY_BASIC_128_RSA_15 => SecurityPolicy::Basic128Rsa15,
            uris::SECURITY_POLICY_BASIC_256 => SecurityPolicy::Basic256,
            uris::SECURITY_POLICY_BASIC_256_SHA_256 => SecurityPolicy::Basic256Sha256,
            uris::SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP => SecurityPolicy::Aes128Sha256RsaOaep,
            uris::SECURITY_POLICY_AES_256_SHA_256_RSA_PSS => SecurityPolicy::Aes256Sha256RsaPss,
            _ => {
                error!("Specified security policy uri \"{}\" is not recognized", uri);
                SecurityPolicy::Unknown
            }
        }
    }

    /// The short name of the policy.
    pub fn name(&self) -> &'static str {
        match self {
            SecurityPolicy::None => "None",
            SecurityPolicy::Basic128Rsa15 => "Basic128Rsa15",
            SecurityPolicy::Basic256 => "Basic256",
            SecurityPolicy::Basic256Sha256 => "Basic256Sha256",
            SecurityPolicy::Aes128Sha256RsaOaep => "Aes128-Sha256-RsaOaep",
            SecurityPolicy::Aes256Sha256RsaPss => "Aes256-Sha256-RsaPss",
            SecurityPolicy::Unknown => "Unknown",
        }
    }

    /// The URI of the policy.
    pub fn to_uri(&self) -> &'static str {
        match self {
            SecurityPolicy::None => uris::SECURITY_POLICY_NONE,
            SecurityPolicy::Basic128Rsa15 => uris::SECURITY_POLICY_BASIC_128_RSA_15,
            SecurityPolicy::Basic256 => uris::SECURITY_POLICY_BASIC_256,
            SecurityPolicy::Basic256Sha256 => uris::SECURITY_POLICY_BASIC_256_SHA_256,
            SecurityPolicy::Aes128Sha256RsaOaep => uris::SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP,
            SecurityPolicy::Aes256Sha256RsaPss => uris::SECURITY_POLICY_AES_256_SHA_256_RSA_PSS,
            SecurityPolicy::Unknown => {
                panic!("Unknown security policy has no uri");
            }
        }
    }

    /// Policies the stack can actually negotiate.
    pub fn is_supported(&self) -> bool {
        !matches!(self, SecurityPolicy::Unknown)
    }

    /// Policies the standard has deprecated but which remain in the field.
    pub fn is_deprecated(&self) -> bool {
        matches!(
            self,
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256
        )
    }

    /// A relative strength ordering for endpoint selection; higher is stronger.
    pub fn security_level(&self) -> u8 {
        match self {
            SecurityPolicy::None | SecurityPolicy::Unknown => 0,
            SecurityPolicy::Basic128Rsa15 => 1,
            SecurityPolicy::Basic256 => 2,
            SecurityPolicy::Aes128Sha256RsaOaep => 3,
            SecurityPolicy::Basic256Sha256 => 4,
            SecurityPolicy::Aes256Sha256RsaPss => 5,
        }
    }

    /// The length in bytes of nonces exchanged in OpenSecureChannel.
    pub fn secure_channel_nonce_length(&self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 => 16,
            SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => 32,
            _ => 0,
        }
    }

    /// The length in bytes of the derived symmetric signing key.
    pub fn derived_signature_key_size(&self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 => 16,
            SecurityPolicy::Basic256 => 24,
            SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => 32,
            _ => 0,
        }
    }

    /// The size in bytes of a symmetric signature.
    pub fn symmetric_signature_size(&self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => SHA1_SIZE,
            SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => SHA256_SIZE,
            _ => 0,
        }
    }

    /// The plain text block size of the symmetric cipher. Encrypted content must be
    /// padded to a multiple of this.
    pub fn plain_block_size(&self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15
            | SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => 16,
            _ => 0,
        }
    }

    /// The RSA padding applied to asymmetric encryption under this policy.
    pub fn asymmetric_encryption_padding(&self) -> RsaPadding {
        match self {
            SecurityPolicy::Basic128Rsa15 => RsaPadding::Pkcs1,
            SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep => RsaPadding::OaepSha1,
            SecurityPolicy::Aes256Sha256RsaPss => RsaPadding::OaepSha256,
            _ => {
                panic!("Security policy {} has no asymmetric encryption", self);
            }
        }
    }

    /// The URI of the asymmetric signature algorithm, carried in signature data.
    pub fn asymmetric_signature_algorithm(&self) -> &'static str {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => algorithms::DSIG_RSA_SHA1,
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                algorithms::DSIG_RSA_SHA256
            }
            SecurityPolicy::Aes256Sha256RsaPss => algorithms::DSIG_RSA_PSS_SHA256,
            _ => {
                panic!("Security policy {} has no asymmetric signature", self);
            }
        }
    }

    /// The URI of the asymmetric encryption algorithm, carried in identity tokens.
    pub fn asymmetric_encryption_algorithm(&self) -> &'static str {
        match self {
            SecurityPolicy::Basic128Rsa15 => algorithms::ENC_RSA_15,
            SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep => algorithms::ENC_RSA_OAEP,
            SecurityPolicy::Aes256Sha256RsaPss => algorithms::ENC_RSA_OAEP_SHA256,
            _ => {
                panic!("Security policy {} has no asymmetric encryption", self);
            }
        }
    }

    /// Create a random nonce of the length this policy requires.
    pub fn random_nonce(&self) -> ByteString {
        match self.secure_channel_nonce_length() {
            0 => ByteString::null(),
            n => super::random::byte_string(n),
        }
    }

    /// Part 6, 6.7.5. Derive the symmetric keys for one direction of a secure channel
    /// from the exchanged nonces: (signing key, encryption key, initialization vector).
    ///
    /// The keys that secure messages sent by the local side are derived from
    /// `(remote_nonce, local_nonce)`; the keys that verify and decrypt messages from the
    /// remote side from `(local_nonce, remote_nonce)`.
    pub fn make_secure_channel_keys(
        &self,
        secret: &[u8],
        seed: &[u8],
    ) -> (Vec<u8>, AesKey, Vec<u8>) {
        // Work out the length of stuff
        let signing_key_length = self.derived_signature_key_size();
        let (encrypting_key_length, encrypting_block_size) = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Aes128Sha256RsaOaep => (16, 16),
            SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes256Sha256RsaPss => (32, 16),
            _ => {
                panic!("Security policy {} has no symmetric keys", self);
            }
        };

        let prf = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => hash::p_sha1,
            _ => hash::p_sha256,
        };

        let bytes = prf(
            secret,
            seed,
            signing_key_length + encrypting_key_length + encrypting_block_size,
        );
        let signing_key = bytes[..signing_key_length].to_vec();
        let encrypting_key = AesKey::new(
            *self,
            &bytes[signing_key_length..signing_key_length + encrypting_key_length],
        );
        let iv = bytes[signing_key_length + encrypting_key_length..].to_vec();
        (signing_key, encrypting_key, iv)
    }

    /// Sign `data` with the symmetric signing key into `signature`.
    pub fn symmetric_sign(
        &self,
        key: &[u8],
        data: &[u8],
        signature: &mut [u8],
    ) -> Result<(), StatusCode> {
        let result = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                hash::hmac_sha1(key, data, signature)
            }
            SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => hash::hmac_sha256(key, data, signature),
            _ => {
                panic!("Security policy {} has no symmetric signature", self);
            }
        };
        result.map_err(|e| e.status())
    }

    /// Verify the symmetric signature over `data`.
    pub fn symmetric_verify_signature(
        &self,
        key: &[u8],
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Error> {
        let verified = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                hash::verify_hmac_sha1(key, data, signature)
            }
            SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => hash::verify_hmac_sha256(key, data, signature),
            _ => {
                panic!("Security policy {} has no symmetric signature", self);
            }
        };
        if verified {
            Ok(())
        } else {
            Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "Symmetric signature verification failed",
            ))
        }
    }

    /// Encrypt `src` into `dst` with the symmetric cipher.
    pub fn symmetric_encrypt(
        &self,
        key: &AesKey,
        iv: &[u8],
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        key.encrypt(src, iv, dst).map_err(|e| e.status())
    }

    /// Decrypt `src` into `dst` with the symmetric cipher.
    pub fn symmetric_decrypt(
        &self,
        key: &AesKey,
        iv: &[u8],
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        key.decrypt(src, iv, dst).map_err(|e| e.status())
    }

    /// Sign `data` with the private key using the policy's asymmetric signature scheme.
    pub fn asymmetric_sign(
        &self,
        signing_key: &PrivateKey,
        data: &[u8],
        signature: &mut [u8],
    ) -> Result<usize, Error> {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                signing_key.sign_sha1(data, signature)
            }
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                signing_key.sign_sha256(data, signature)
            }
            SecurityPolicy::Aes256Sha256RsaPss => signing_key.sign_sha256_pss(data, signature),
            _ => {
                panic!("Security policy {} has no asymmetric signature", self);
            }
        }
    }

    /// Verify an asymmetric signature over `data`.
    pub fn asymmetric_verify_signature(
        &self,
        verification_key: &PublicKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Error> {
        let verified = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                verification_key.verify_sha1(data, signature)
            }
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                verification_key.verify_sha256(data, signature)
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                verification_key.verify_sha256_pss(data, signature)
            }
            _ => {
                panic!("Security policy {} has no asymmetric signature", self);
            }
        };
        if verified {
            Ok(())
        } else {
            Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "Asymmetric signature verification failed",
            ))
        }
    }

    /// Encrypt `src` into `dst` with the remote public key.
    pub fn asymmetric_encrypt(
        &self,
        encryption_key: &PublicKey,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        encryption_key
            .encrypt(src, dst, self.asymmetric_encryption_padding())
            .map_err(|e| e.status())
    }

    /// Decrypt `src` into `dst` with the local private key.
    pub fn asymmetric_decrypt(
        &self,
        decryption_key: &PrivateKey,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        decryption_key
            .decrypt(src, dst, self.asymmetric_encryption_padding())
            .map_err(|e| e.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_round_trip() {
        for policy in [
            SecurityPolicy::None,
            SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes128Sha256RsaOaep,
            SecurityPolicy::Aes256Sha256RsaPss,
        ] {
            assert_eq!(SecurityPolicy::from_uri(policy.to_uri()), policy);
            assert_eq!(SecurityPolicy::from_str(policy.name()).unwrap(), policy);
        }
        assert_eq!(
            SecurityPolicy::from_uri("http://opcfoundation.org/UA/SecurityPolicy#Bogus"),
            SecurityPolicy::Unknown
        );
    }

    #[test]
    fn derived_keys_are_directional() {
        let policy = SecurityPolicy::Basic256Sha256;
        let local_nonce = [1u8; 32];
        let remote_nonce = [2u8; 32];
        let (sign_out, enc_out, iv_out) =
            policy.make_secure_channel_keys(&remote_nonce, &local_nonce);
        let (sign_in, enc_in, iv_in) = policy.make_secure_channel_keys(&local_nonce, &remote_nonce);
        assert_ne!(sign_out, sign_in);
        assert_ne!(enc_out.value(), enc_in.value());
        assert_ne!(iv_out, iv_in);
        assert_eq!(sign_out.len(), 32);
        assert_eq!(enc_out.value().len(), 32);
        assert_eq!(iv_out.len(), 16);
    }

    #[test]
    fn symmetric_sign_and_verify() {
        let policy = SecurityPolicy::Aes128Sha256RsaOaep;
        let key = [5u8; 32];
        let data = b"chunk content to protect";
        let mut signature = vec![0u8; policy.symmetric_signature_size()];
        policy.symmetric_sign(&key, data, &mut signature).unwrap();
        policy
            .symmetric_verify_signature(&key, data, &signature)
            .unwrap();
        assert!(policy
            .symmetric_verify_signature(&key, b"forged data", &signature)
            .is_err());
    }
}
