// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Cryptography for the OPC UA secure channel and session layers: security policies,
//! key derivation, symmetric and asymmetric primitives, X.509 certificate handling and
//! a directory based PKI certificate store.

pub mod aeskey;
pub mod certificate_store;
pub mod hash;
pub mod pkey;
pub mod random;
pub mod security_policy;
pub mod thumbprint;
pub mod user_identity;
pub mod x509;

pub use aeskey::AesKey;
pub use certificate_store::CertificateStore;
pub use pkey::{KeySize, PrivateKey, PublicKey, RsaPadding};
pub use security_policy::SecurityPolicy;
pub use thumbprint::Thumbprint;
pub use user_identity::{
    create_signature_data, make_user_name_identity_token, verify_signature_data,
};
pub use x509::X509;
