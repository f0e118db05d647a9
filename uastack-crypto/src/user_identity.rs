// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! User identity support: password encryption for user name tokens and the signatures
//! carried by CreateSession and ActivateSession.

use std::io::{Cursor, Write};

use log::error;

use uastack_types::{
    write_i32, ByteString, Error, SignatureData, StatusCode, UAString, UserNameIdentityToken,
    UserTokenPolicy,
};

use super::{
    pkey::{KeySize, PrivateKey},
    security_policy::SecurityPolicy,
    x509::X509,
};

/// Build a user name identity token for the given endpoint policy.
///
/// The password is encrypted with the server certificate's public key using the user
/// token policy's security policy, falling back to the channel policy when the token
/// policy does not carry one. When the effective policy is None the password travels as
/// plain UTF-8, which is only acceptable on a channel that is itself encrypted.
pub fn make_user_name_identity_token(
    channel_security_policy: SecurityPolicy,
    user_token_policy: &UserTokenPolicy,
    nonce: &[u8],
    cert: &Option<X509>,
    user: &str,
    pass: &str,
) -> Result<UserNameIdentityToken, Error> {
    // Determine the security policy for the token, either from the token policy
    // or from the secure channel.
    let security_policy = if user_token_policy.security_policy_uri.is_empty() {
        channel_security_policy
    } else {
        SecurityPolicy::from_uri(user_token_policy.security_policy_uri.as_ref())
    };

    if security_policy == SecurityPolicy::Unknown {
        return Err(Error::new(
            StatusCode::BadSecurityPolicyRejected,
            format!(
                "Unknown security policy {} for user token",
                user_token_policy.security_policy_uri
            ),
        ));
    }
    // A plaintext password inside an encrypted channel is acceptable, the reverse is not.
    if security_policy == SecurityPolicy::None && channel_security_policy == SecurityPolicy::None {
        error!("Password will be sent in plain text on an unencrypted channel");
    }

    let (password, encryption_algorithm) = if security_policy == SecurityPolicy::None {
        (ByteString::from(pass.as_bytes()), UAString::null())
    } else {
        let Some(cert) = cert else {
            return Err(Error::new(
                StatusCode::BadCertificateInvalid,
                "Cannot encrypt password, server certificate is unavailable",
            ));
        };
        let password = legacy_encrypt_secret(cert, security_policy, nonce, pass.as_bytes())?;
        (
            password,
            UAString::from(security_policy.asymmetric_encryption_algorithm()),
        )
    };

    Ok(UserNameIdentityToken {
        policy_id: user_token_policy.policy_id.clone(),
        user_name: UAString::from(user),
        password,
        encryption_algorithm,
    })
}

/// Encrypt a secret following the legacy encrypted secret format from Part 4 7.36.2.2:
/// a 4 byte little endian length of `secret || nonce`, followed by the secret and the
/// server nonce, the whole buffer RSA encrypted with the server's public key.
fn legacy_encrypt_secret(
    cert: &X509,
    security_policy: SecurityPolicy,
    nonce: &[u8],
    secret: &[u8],
) -> Result<ByteString, Error> {
    let mut buffer = Cursor::new(Vec::with_capacity(4 + secret.len() + nonce.len()));
    write_i32(&mut buffer, (secret.len() + nonce.len()) as i32)?;
    buffer.write_all(secret).map_err(Error::encoding)?;
    buffer.write_all(nonce).map_err(Error::encoding)?;
    let plaintext = buffer.into_inner();

    let public_key = cert.public_key()?;
    let padding = security_policy.asymmetric_encryption_padding();
    let mut encrypted = vec![0u8; public_key.calculate_cipher_text_size(plaintext.len(), padding)];
    let size = public_key.encrypt(&plaintext, &mut encrypted, padding)?;
    encrypted.truncate(size);
    Ok(ByteString::from(encrypted))
}

/// Sign `certificate || nonce` with the private key, producing the signature data carried
/// by CreateSession and ActivateSession requests.
pub fn create_signature_data(
    signing_key: &PrivateKey,
    security_policy: SecurityPolicy,
    contained_cert: &ByteString,
    nonce: &ByteString,
) -> Result<SignatureData, StatusCode> {
    let (algorithm, signature) = if security_policy == SecurityPolicy::None {
        (UAString::null(), ByteString::null())
    } else {
        let data = [contained_cert.as_ref(), nonce.as_ref()].concat();
        let mut signature = vec![0u8; signing_key.size()];
        security_policy
            .asymmetric_sign(signing_key, &data, &mut signature)
            .map_err(|e| e.status())?;
        (
            UAString::from(security_policy.asymmetric_signature_algorithm()),
            ByteString::from(signature),
        )
    };
    Ok(SignatureData {
        algorithm,
        signature,
    })
}

/// Verify a signature over `certificate || nonce` made by the holder of the signing
/// certificate's private key. Used to validate the server signature in CreateSession.
pub fn verify_signature_data(
    signature: &SignatureData,
    security_policy: SecurityPolicy,
    signing_cert: &X509,
    contained_cert: &ByteString,
    nonce: &ByteString,
) -> Result<(), Error> {
    if security_policy == SecurityPolicy::None {
        return Ok(());
    }
    let verification_key = signing_cert.public_key()?;
    let data = [contained_cert.as_ref(), nonce.as_ref()].concat();
    security_policy
        .asymmetric_verify_signature(&verification_key, &data, signature.signature.as_ref())
        .map_err(|_| {
            Error::new(
                StatusCode::BadApplicationSignatureInvalid,
                "Signature over certificate and nonce did not verify",
            )
        })
}
