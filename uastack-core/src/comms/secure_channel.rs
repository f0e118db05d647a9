// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! The secure channel handles security on an OPC UA connection: token lifecycle, key
//! derivation from the exchanged nonces, and per-chunk signing and encryption.

use std::{
    collections::HashMap,
    io::{Cursor, Write},
    ops::{Deref, Range},
    sync::Arc,
};

use bytes::Buf;
use chrono::Duration;
use log::{error, trace};

use uastack_crypto::{
    AesKey, CertificateStore, KeySize, PrivateKey, PublicKey, SecurityPolicy, X509,
};
use uastack_types::{
    write_bytes, write_u32, write_u8, ByteString, ChannelSecurityToken, ContextOwned, DateTime,
    DecodingOptions, Error, MessageSecurityMode, NamespaceMap, SimpleBinaryDecodable, StatusCode,
};
use parking_lot::RwLock;

use super::{
    message_chunk::{MessageChunk, MessageChunkHeader, MessageChunkType, MESSAGE_SIZE_OFFSET},
    security_header::{AsymmetricSecurityHeader, SecurityHeader, SymmetricSecurityHeader},
};

#[derive(Debug)]
struct RemoteKeys {
    keys: (Vec<u8>, AesKey, Vec<u8>),
    expires_at: DateTime,
}

/// Holds all of the security state of one conversation with a server: the negotiated
/// policy and mode, the active (and recently retired) security tokens, the derived
/// symmetric keys, and the certificates in play.
pub struct SecureChannel {
    /// The security policy for the connection, None or Encryption/Signing settings.
    security_policy: SecurityPolicy,
    /// The security mode for the connection, None, Sign, SignAndEncrypt.
    security_mode: MessageSecurityMode,
    /// Secure channel id, chosen by the server.
    secure_channel_id: u32,
    /// Token creation time.
    token_created_at: DateTime,
    /// Token lifetime in milliseconds.
    token_lifetime: u32,
    /// Token identifier.
    token_id: u32,
    /// Our certificate.
    cert: Option<X509>,
    /// Our private key.
    private_key: Option<PrivateKey>,
    /// The server's certificate.
    remote_cert: Option<X509>,
    /// The server's nonce from the last open secure channel exchange.
    remote_nonce: Vec<u8>,
    /// Our nonce from the last open secure channel exchange.
    local_nonce: Vec<u8>,
    /// The server's symmetric keys by token id: signing key, encryption key, IV.
    ///
    /// Keys for retired tokens stay here for part of the old token's lifetime, because
    /// the server may keep securing messages with the old token for a while after a
    /// renewal. See Part 4 5.5.2.
    remote_keys: HashMap<u32, RemoteKeys>,
    /// Our symmetric keys: signing key, encryption key, IV.
    local_keys: Option<(Vec<u8>, AesKey, Vec<u8>)>,
    /// Encoding context: namespaces, type loaders and decoding limits.
    encoding_context: Arc<RwLock<ContextOwned>>,
}

impl SecureChannel {
    /// Create a secure channel reading the application certificate and key from the
    /// given certificate store. A missing certificate only matters once a policy other
    /// than None is configured.
    pub fn new(
        certificate_store: Arc<RwLock<CertificateStore>>,
        encoding_context: Arc<RwLock<ContextOwned>>,
    ) -> SecureChannel {
        let (cert, private_key) = {
            let certificate_store = certificate_store.read();
            let cert = match certificate_store.read_own_cert() {
                Err(e) => {
                    error!("Failed to read own certificate: {e}. Check paths, crypto won't work");
                    None
                }
                Ok(r) => Some(r),
            };
            let pkey = match certificate_store.read_own_pkey() {
                Err(e) => {
                    error!("Failed to read own private key: {e}. Check paths, crypto won't work");
                    None
                }
                Ok(r) => Some(r),
            };
            (cert, pkey)
        };
        SecureChannel {
            security_mode: MessageSecurityMode::None,
            security_policy: SecurityPolicy::None,
            secure_channel_id: 0,
            token_id: 0,
            token_created_at: DateTime::now(),
            token_lifetime: 0,
            local_nonce: Vec::new(),
            remote_nonce: Vec::new(),
            cert,
            private_key,
            remote_cert: None,
            local_keys: None,
            encoding_context,
            remote_keys: HashMap::new(),
        }
    }

    /// A channel with no certificates, only useful for policy None and tests.
    pub fn new_no_certificate_store() -> SecureChannel {
        SecureChannel {
            security_policy: SecurityPolicy::None,
            security_mode: MessageSecurityMode::None,
            secure_channel_id: 0,
            token_id: 0,
            token_created_at: DateTime::now(),
            token_lifetime: 0,
            local_nonce: Vec::new(),
            remote_nonce: Vec::new(),
            cert: None,
            private_key: None,
            remote_cert: None,
            local_keys: None,
            encoding_context: Default::default(),
            remote_keys: HashMap::new(),
        }
    }

    /// Set the application certificate.
    pub fn set_cert(&mut self, cert: Option<X509>) {
        self.cert = cert;
    }

    /// Get the application certificate.
    pub fn cert(&self) -> Option<X509> {
        self.cert.clone()
    }

    /// Set the application private key.
    pub fn set_private_key(&mut self, private_key: Option<PrivateKey>) {
        self.private_key = private_key;
    }

    /// Set the remote certificate.
    pub fn set_remote_cert(&mut self, remote_cert: Option<X509>) {
        self.remote_cert = remote_cert;
    }

    /// Get the remote certificate.
    pub fn remote_cert(&self) -> Option<X509> {
        self.remote_cert.clone()
    }

    /// Set the remote certificate from wire bytes.
    pub fn set_remote_cert_from_byte_string(
        &mut self,
        remote_cert: &ByteString,
    ) -> Result<(), StatusCode> {
        self.remote_cert = if remote_cert.is_null() {
            None
        } else {
            Some(X509::from_byte_string(remote_cert).map_err(|e| e.status())?)
        };
        Ok(())
    }

    /// Get the security mode.
    pub fn security_mode(&self) -> MessageSecurityMode {
        self.security_mode
    }

    /// Set the security mode.
    pub fn set_security_mode(&mut self, security_mode: MessageSecurityMode) {
        self.security_mode = security_mode;
    }

    /// Get the security policy.
    pub fn security_policy(&self) -> SecurityPolicy {
        self.security_policy
    }

    /// Set the security policy.
    pub fn set_security_policy(&mut self, security_policy: SecurityPolicy) {
        self.security_policy = security_policy;
    }

    /// Whether the channel signs outgoing chunks.
    pub fn signing_enabled(&self) -> bool {
        self.security_policy != SecurityPolicy::None
            && matches!(
                self.security_mode,
                MessageSecurityMode::Sign | MessageSecurityMode::SignAndEncrypt
            )
    }

    /// Clear the configured security token, done before reopening a channel.
    pub fn clear_security_token(&mut self) {
        self.secure_channel_id = 0;
        self.token_id = 0;
        self.token_created_at = DateTime::now();
        self.token_lifetime = 0;
    }

    /// Set the channel security token from an open secure channel response.
    pub fn set_security_token(&mut self, channel_token: ChannelSecurityToken) {
        self.secure_channel_id = channel_token.channel_id;
        self.token_id = channel_token.token_id;
        self.token_created_at = channel_token.created_at;
        self.token_lifetime = channel_token.revised_lifetime;
    }

    /// Get the ID of the secure channel on the server.
    pub fn secure_channel_id(&self) -> u32 {
        self.secure_channel_id
    }

    /// Get the ID of the active token.
    pub fn token_id(&self) -> u32 {
        self.token_id
    }

    /// Get the time the active token was created.
    pub fn token_created_at(&self) -> DateTime {
        self.token_created_at
    }

    /// Get the lifetime of the active token in milliseconds.
    pub fn token_lifetime(&self) -> u32 {
        self.token_lifetime
    }

    /// Set the offset in time between the clock of the server and the client.
    pub fn set_client_offset(&mut self, client_offset: Duration) {
        self.encoding_context.write().options_mut().client_offset = client_offset;
    }

    /// Set the decoding options, preserving the client offset.
    pub fn set_decoding_options(&mut self, decoding_options: DecodingOptions) {
        let mut context = self.encoding_context.write();
        let offset = context.options().client_offset;
        (*context.options_mut()) = DecodingOptions {
            client_offset: offset,
            ..decoding_options
        };
    }

    /// Get a reference to the encoding context.
    pub fn context(&self) -> impl Deref<Target = ContextOwned> + '_ {
        self.encoding_context.read()
    }

    /// Get a reference counted reference to the encoding context.
    pub fn context_arc(&self) -> Arc<RwLock<ContextOwned>> {
        self.encoding_context.clone()
    }

    /// Set the namespace map, done after session activation.
    pub fn set_namespaces(&self, namespaces: NamespaceMap) {
        *self.encoding_context.write().namespaces_mut() = namespaces;
    }

    /// Get the decoding options.
    pub fn decoding_options(&self) -> DecodingOptions {
        self.context().options().clone()
    }

    /// Test if the security token needs to be renewed: 75% or more of its lifetime
    /// has elapsed.
    pub fn should_renew_security_token(&self) -> bool {
        if self.token_id() == 0 {
            false
        } else {
            let renew_lifetime = (self.token_lifetime * 3) / 4;
            let renew_lifetime = Duration::milliseconds(renew_lifetime as i64);
            DateTime::now() - self.token_created_at > renew_lifetime
        }
    }

    /// Makes a security header according to the type of message being sent, symmetric
    /// or asymmetric.
    pub fn make_security_header(&self, message_type: MessageChunkType) -> SecurityHeader {
        match message_type {
            MessageChunkType::OpenSecureChannel => {
                let asymmetric_security_header = if self.security_policy == SecurityPolicy::None {
                    AsymmetricSecurityHeader::none()
                } else {
                    let receiver_certificate_thumbprint =
                        if let Some(ref remote_cert) = self.remote_cert {
                            remote_cert.thumbprint().as_byte_string()
                        } else {
                            ByteString::null()
                        };
                    AsymmetricSecurityHeader::new(
                        self.security_policy,
                        self.cert.as_ref().expect("certificate is required for policies other than None"),
                        receiver_certificate_thumbprint,
                    )
                };
                SecurityHeader::Asymmetric(asymmetric_security_header)
            }
            _ => SecurityHeader::Symmetric(SymmetricSecurityHeader {
                token_id: self.token_id,
            }),
        }
    }

    /// Create a local nonce of the policy's key length for the next open secure
    /// channel exchange.
    pub fn create_random_nonce(&mut self) {
        self.local_nonce
            .resize(self.security_policy.secure_channel_nonce_length(), 0);
        uastack_crypto::random::bytes(&mut self.local_nonce);
    }

    /// Get the local nonce.
    pub fn local_nonce(&self) -> &[u8] {
        &self.local_nonce
    }

    /// Set the local nonce.
    pub fn set_local_nonce(&mut self, local_nonce: &[u8]) {
        self.local_nonce.clear();
        self.local_nonce.extend_from_slice(local_nonce);
    }

    /// Get the local nonce as a byte string.
    pub fn local_nonce_as_byte_string(&self) -> ByteString {
        if self.local_nonce.is_empty() {
            ByteString::null()
        } else {
            ByteString::from(&self.local_nonce)
        }
    }

    /// Set the remote nonce, validating its length against the policy.
    pub fn set_remote_nonce_from_byte_string(
        &mut self,
        remote_nonce: &ByteString,
    ) -> Result<(), StatusCode> {
        if let Some(ref remote_nonce) = remote_nonce.value {
            if self.security_policy != SecurityPolicy::None
                && remote_nonce.len() != self.security_policy.secure_channel_nonce_length()
            {
                error!(
                    "Remote nonce is invalid length {}, expecting {}",
                    remote_nonce.len(),
                    self.security_policy.secure_channel_nonce_length()
                );
                Err(StatusCode::BadNonceInvalid)
            } else {
                self.remote_nonce = remote_nonce.to_vec();
                Ok(())
            }
        } else if self.security_policy != SecurityPolicy::None {
            Err(StatusCode::BadNonceInvalid)
        } else {
            Ok(())
        }
    }

    /// Get the remote nonce.
    pub fn remote_nonce(&self) -> &[u8] {
        &self.remote_nonce
    }

    /// Get the remote nonce as a byte string.
    pub fn remote_nonce_as_byte_string(&self) -> ByteString {
        if self.remote_nonce.is_empty() {
            ByteString::null()
        } else {
            ByteString::from(&self.remote_nonce)
        }
    }

    /// Part 6, 6.7.5. Derive the four symmetric keys from the pair of nonces. Keys
    /// derived from `(remote_nonce, local_nonce)` secure outbound messages; keys derived
    /// from `(local_nonce, remote_nonce)` verify and decrypt inbound ones. The inbound
    /// keys are registered under the current token id; keys of earlier tokens stay valid
    /// for a grace period.
    pub fn derive_keys(&mut self) {
        self.insert_remote_keys(
            self.security_policy
                .make_secure_channel_keys(&self.local_nonce, &self.remote_nonce),
        );
        self.local_keys = Some(
            self.security_policy
                .make_secure_channel_keys(&self.remote_nonce, &self.local_nonce),
        );
        trace!(
            "Derived keys for token {} on channel {}",
            self.token_id,
            self.secure_channel_id
        );
    }

    /// Calculates the signature size for a message depending on the supplied security header.
    pub fn signature_size(&self, security_header: &SecurityHeader) -> usize {
        match security_header {
            SecurityHeader::Asymmetric(security_header) => {
                if !security_header.sender_certificate.is_null() {
                    match X509::from_byte_string(&security_header.sender_certificate)
                        .and_then(|x509| x509.public_key())
                    {
                        Ok(pk) => pk.size(),
                        Err(_) => 0,
                    }
                } else {
                    0
                }
            }
            SecurityHeader::Symmetric(_) => self.security_policy.symmetric_signature_size(),
        }
    }

    // Extra padding byte required for key sizes > 2048 bits (256 bytes).
    fn minimum_padding(key_length: usize) -> usize {
        if key_length <= 256 {
            1
        } else {
            2
        }
    }

    /// Get the plain text block size and minimum padding for this channel. Both are zero
    /// when nothing is encrypted.
    pub fn get_padding_block_sizes(
        &self,
        security_header: &SecurityHeader,
        signature_size: usize,
        message_type: MessageChunkType,
    ) -> (usize, usize) {
        if self.security_policy == SecurityPolicy::None
            || self.security_mode != MessageSecurityMode::SignAndEncrypt
                && !message_type.is_open_secure_channel()
        {
            return (0, 0);
        }

        match security_header {
            SecurityHeader::Asymmetric(security_header) => {
                if security_header.sender_certificate.is_null() {
                    (self.security_policy.plain_block_size(), signature_size)
                } else {
                    // Padding is a function of the remote certificate and the policy.
                    let padding = self.security_policy.asymmetric_encryption_padding();
                    let Some(pk) = self
                        .remote_cert
                        .as_ref()
                        .and_then(|cert| cert.public_key().ok())
                    else {
                        return (self.security_policy.plain_block_size(), signature_size);
                    };
                    (
                        pk.plain_text_block_size(padding),
                        Self::minimum_padding(pk.size()),
                    )
                }
            }
            SecurityHeader::Symmetric(_) => (
                self.security_policy.plain_block_size(),
                Self::minimum_padding(signature_size),
            ),
        }
    }

    /// Calculate the padding: the bytes added after the body so the encrypted region is
    /// a whole number of cipher blocks. Returns (total padding, minimum padding bytes).
    pub fn padding_size(
        &self,
        security_header: &SecurityHeader,
        body_size: usize,
        signature_size: usize,
        message_type: MessageChunkType,
    ) -> (usize, usize) {
        let (plain_text_block_size, minimum_padding) =
            self.get_padding_block_sizes(security_header, signature_size, message_type);

        if plain_text_block_size == 0 {
            return (0, 0);
        }

        // PaddingSize = PlainTextBlockSize - ((BytesToWrite + SignatureSize + 1) % PlainTextBlockSize)
        let encrypt_size = 8 + body_size + signature_size + minimum_padding;
        let padding_size = if encrypt_size % plain_text_block_size != 0 {
            plain_text_block_size - (encrypt_size % plain_text_block_size)
        } else {
            0
        };
        (minimum_padding + padding_size, minimum_padding)
    }

    // Takes an unpadded message chunk and adds padding as well as space at the end to
    // accommodate a signature. The message size header is rewritten to match.
    fn add_space_for_padding_and_signature(
        &self,
        message_chunk: &MessageChunk,
    ) -> Result<Vec<u8>, Error> {
        let chunk_info = message_chunk.chunk_info(self)?;
        let data = &message_chunk.data[..];

        let security_header = chunk_info.security_header;
        let signature_size = self.signature_size(&security_header);
        let body_size = chunk_info.body_length;

        let (padding_size, minimum_padding) = self.padding_size(
            &security_header,
            body_size,
            signature_size,
            chunk_info.message_header.message_type,
        );

        let buffer = Vec::with_capacity(message_chunk.data.len() + padding_size + signature_size);
        let mut stream = Cursor::new(buffer);

        stream.write_all(data)?;

        if padding_size > 0 {
            // Every padding byte holds the padding size. With two byte padding the final
            // byte holds the high half.
            if minimum_padding == 1 {
                let padding_byte = ((padding_size - 1) & 0xff) as u8;
                let _ = write_bytes(&mut stream, padding_byte, padding_size)?;
            } else if minimum_padding == 2 {
                let padding_byte = ((padding_size - 2) & 0xff) as u8;
                let extra_padding_byte = ((padding_size - 2) >> 8) as u8;
                let _ = write_bytes(&mut stream, padding_byte, padding_size - 1)?;
                write_u8(&mut stream, extra_padding_byte)?;
            }
        }

        // Zeros where the signature will go.
        let _ = write_bytes(&mut stream, 0u8, signature_size)?;

        let message_size = data.len() + padding_size + signature_size;
        Self::update_message_size_and_truncate(stream.into_inner(), message_size)
    }

    fn update_message_size(data: &mut [u8], message_size: usize) -> Result<(), Error> {
        let mut stream = Cursor::new(data);
        stream.advance(MESSAGE_SIZE_OFFSET);
        write_u32(&mut stream, message_size as u32)
    }

    /// Writes the message size into the chunk header and truncates the buffer to fit.
    pub fn update_message_size_and_truncate(
        mut data: Vec<u8>,
        message_size: usize,
    ) -> Result<Vec<u8>, Error> {
        Self::update_message_size(&mut data[..], message_size)?;
        data.truncate(message_size);
        Ok(data)
    }

    /// Applies security to a message chunk and yields an encrypted/signed block to be
    /// streamed. Returns the size of the secured chunk in `dst`.
    ///
    /// The wire layout, S marking the signed region and E the encrypted one:
    ///
    /// ```text
    /// S - Message Header
    /// S - Security Header
    /// S - Sequence Header - E
    /// S - Body            - E
    /// S - Padding         - E
    ///     Signature       - E
    /// ```
    pub fn apply_security(
        &self,
        message_chunk: &MessageChunk,
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let size = if self.security_policy != SecurityPolicy::None
            && (self.security_mode == MessageSecurityMode::Sign
                || self.security_mode == MessageSecurityMode::SignAndEncrypt)
        {
            let encrypted_data_offset =
                message_chunk.encrypted_data_offset(&self.decoding_options())?;

            let mut data = self.add_space_for_padding_and_signature(message_chunk)?;
            crate::log_buffer("Chunk after padding", &data[..]);

            // Encrypted range is from the sequence header to the end.
            let encrypted_range = encrypted_data_offset..data.len();

            let encrypted_size = if message_chunk.is_open_secure_channel(&self.decoding_options()) {
                self.asymmetric_sign_and_encrypt(
                    self.security_policy,
                    &mut data,
                    encrypted_range,
                    dst,
                )?
            } else {
                let signed_range =
                    0..(data.len() - self.security_policy.symmetric_signature_size());
                self.symmetric_sign_and_encrypt(&mut data, signed_range, encrypted_range, dst)?
            };

            encrypted_size
        } else {
            let size = message_chunk.data.len();
            if size > dst.len() {
                error!("The size of the message chunk {} exceeds the size of the destination buffer {}", size, dst.len());
                return Err(StatusCode::BadEncodingLimitsExceeded);
            }
            dst[..size].copy_from_slice(&message_chunk.data[..]);
            size
        };
        Ok(size)
    }

    /// Decrypts and verifies a chunk received from the server, returning the plain
    /// chunk with its message size header rewritten.
    pub fn verify_and_remove_security(&mut self, src: &[u8]) -> Result<MessageChunk, Error> {
        let decoding_options = self.decoding_options();
        let (message_header, security_header, encrypted_data_offset) = {
            let mut stream = Cursor::new(&src);
            let message_header = MessageChunkHeader::decode(&mut stream, &decoding_options)?;
            let security_header = SecurityHeader::decode_from_stream(
                &mut stream,
                message_header.message_type.is_open_secure_channel(),
                &decoding_options,
            )?;
            let encrypted_data_offset = stream.position() as usize;
            (message_header, security_header, encrypted_data_offset)
        };

        let message_size = message_header.message_size as usize;
        if message_size != src.len() {
            return Err(Error::new(
                StatusCode::BadUnexpectedError,
                format!(
                    "The message size {} is not the same as the supplied buffer {}",
                    message_size,
                    src.len()
                ),
            ));
        }

        let data = if message_header.message_type.is_open_secure_channel() {
            // OpenSecureChannel responses carry the policy in their security header and
            // are always asymmetrically secured when the policy is not None.
            let encrypted_range = encrypted_data_offset..message_size;

            let SecurityHeader::Asymmetric(security_header) = security_header else {
                return Err(Error::new(
                    StatusCode::BadUnexpectedError,
                    "OpenSecureChannel chunk did not have an asymmetric security header",
                ));
            };

            let security_policy_uri = security_header.security_policy_uri.as_ref();
            let security_policy = SecurityPolicy::from_uri(security_policy_uri);
            match security_policy {
                SecurityPolicy::Unknown => {
                    return Err(Error::new(
                        StatusCode::BadSecurityPolicyRejected,
                        format!(
                            "Security policy \"{}\" is unknown so it has been rejected",
                            security_policy_uri
                        ),
                    ));
                }
                SecurityPolicy::None => {
                    return Ok(MessageChunk { data: src.to_vec() });
                }
                _ => {}
            }
            self.security_policy = security_policy;

            // Asymmetric decrypt with our private key, verify the signature with the
            // sender certificate's public key. Whether the certificate is trusted is
            // established separately, here it only needs to have signed the chunk.
            if security_header.sender_certificate.is_null() {
                return Err(Error::new(
                    StatusCode::BadCertificateInvalid,
                    "Sender certificate is null",
                ));
            }
            let sender_certificate = X509::from_byte_string(&security_header.sender_certificate)?;
            let verification_key = sender_certificate.public_key()?;
            let receiver_thumbprint = security_header.receiver_certificate_thumbprint;

            let mut decrypted_data = vec![0u8; message_size];
            let decrypted_size = self.asymmetric_decrypt_and_verify(
                security_policy,
                &verification_key,
                receiver_thumbprint,
                src,
                encrypted_range,
                &mut decrypted_data,
            )?;

            Self::update_message_size_and_truncate(decrypted_data, decrypted_size)?
        } else if self.signing_enabled() {
            let signature_size = self.security_policy.symmetric_signature_size();
            let encrypted_range = encrypted_data_offset..message_size;
            let signed_range = 0..(message_size - signature_size);

            let SecurityHeader::Symmetric(security_header) = security_header else {
                return Err(Error::new(
                    StatusCode::BadUnexpectedError,
                    format!(
                        "Expected symmetric security header, got {:?}",
                        security_header
                    ),
                ));
            };

            let mut decrypted_data = vec![0u8; message_size];
            let decrypted_size = self.symmetric_decrypt_and_verify(
                src,
                signed_range,
                encrypted_range,
                security_header.token_id,
                &mut decrypted_data,
            )?;

            Self::update_message_size_and_truncate(decrypted_data, decrypted_size)?
        } else {
            src.to_vec()
        };

        Ok(MessageChunk { data })
    }

    /// Asymmetrically sign and encrypt the chunk for an OpenSecureChannel request:
    /// signed with our private key, encrypted with the server's public key.
    fn asymmetric_sign_and_encrypt(
        &self,
        security_policy: SecurityPolicy,
        src: &mut [u8],
        encrypted_range: Range<usize>,
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let header_size = encrypted_range.start;

        let Some(signing_key) = self.private_key.as_ref() else {
            error!("Cannot sign an OpenSecureChannel chunk without a private key");
            return Err(StatusCode::BadSecurityChecksFailed);
        };
        let signing_key_size = signing_key.size();

        let signed_range = 0..(encrypted_range.end - signing_key_size);
        let signature_range = signed_range.end..encrypted_range.end;

        let encryption_key = self
            .remote_cert
            .as_ref()
            .ok_or(StatusCode::BadCertificateInvalid)?
            .public_key()
            .map_err(|e| e.status())?;

        // Encryption changes the size of the chunk. Since signing precedes encryption,
        // the size in the header must be the final encrypted size before signing.
        let cipher_text_size = {
            let padding = security_policy.asymmetric_encryption_padding();
            let plain_text_size = encrypted_range.end - encrypted_range.start;
            encryption_key.calculate_cipher_text_size(plain_text_size, padding)
        };
        Self::update_message_size(src, header_size + cipher_text_size).map_err(|e| e.status())?;
        dst[0..encrypted_range.start].copy_from_slice(&src[0..encrypted_range.start]);

        // Sign message header, security header, sequence header, body, padding.
        let (l, r) = src.split_at_mut(signed_range.end);
        security_policy.asymmetric_sign(signing_key, l, &mut r[0..signing_key_size])
            .map_err(|e| e.status())?;

        debug_assert_eq!(encrypted_range.end, signature_range.end);

        // Encrypt the sequence header, payload and signature into dst.
        let encrypted_size = security_policy.asymmetric_encrypt(
            &encryption_key,
            &src[encrypted_range.clone()],
            &mut dst[encrypted_range.start..],
        )?;

        if encrypted_size != cipher_text_size {
            error!(
                "Encrypted block size {} is not the calculated cipher text size {}",
                encrypted_size, cipher_text_size
            );
            return Err(StatusCode::BadSecurityChecksFailed);
        }

        Ok(header_size + encrypted_size)
    }

    fn check_padding_bytes(
        padding_bytes: &[u8],
        expected_padding_byte: u8,
        padding_range_start: usize,
    ) -> Result<(), Error> {
        for (i, b) in padding_bytes.iter().enumerate() {
            if *b != expected_padding_byte {
                return Err(Error::new(
                    StatusCode::BadSecurityChecksFailed,
                    format!(
                        "Expected padding byte {}, got {} at index {}",
                        expected_padding_byte,
                        *b,
                        padding_range_start + i
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Verify that the padding is correct. Padding is expected to end at the supplied
    /// index. Returns the padding range so the caller can strip it.
    fn verify_padding(
        &self,
        src: &[u8],
        key_size: usize,
        padding_end: usize,
    ) -> Result<Range<usize>, Error> {
        let padding_range = if key_size > 256 {
            let padding_byte = src[padding_end - 2];
            let extra_padding_byte = src[padding_end - 1];
            let padding_size = ((extra_padding_byte as usize) << 8) + (padding_byte as usize);
            let padding_range = (padding_end - padding_size - 2)..padding_end;

            Self::check_padding_bytes(
                &src[padding_range.start..(padding_range.end - 1)],
                padding_byte,
                padding_range.start,
            )?;
            if src[padding_range.end - 1] != extra_padding_byte {
                return Err(Error::new(
                    StatusCode::BadSecurityChecksFailed,
                    format!(
                        "Expected extra padding byte {}, at index {}",
                        extra_padding_byte, padding_range.start
                    ),
                ));
            }
            padding_range
        } else {
            let padding_byte = src[padding_end - 1];
            let padding_size = padding_byte as usize;
            let padding_range = (padding_end - padding_size - 1)..padding_end;
            Self::check_padding_bytes(
                &src[padding_range.clone()],
                padding_byte,
                padding_range.start,
            )?;
            padding_range
        };
        Ok(padding_range)
    }

    fn asymmetric_decrypt_and_verify(
        &self,
        security_policy: SecurityPolicy,
        verification_key: &PublicKey,
        receiver_thumbprint: ByteString,
        src: &[u8],
        encrypted_range: Range<usize>,
        dst: &mut [u8],
    ) -> Result<usize, Error> {
        if !security_policy.is_supported() {
            return Err(Error::new(
                StatusCode::BadSecurityPolicyRejected,
                format!("Security policy {} is not supported", security_policy),
            ));
        }

        // The receiver certificate thumbprint names the certificate the peer encrypted
        // with, which must be ours.
        let our_cert = self.cert.as_ref().ok_or_else(|| {
            Error::new(
                StatusCode::BadNoValidCertificates,
                "No application certificate configured",
            )
        })?;
        let our_thumbprint = our_cert.thumbprint();
        if our_thumbprint.value() != receiver_thumbprint.as_ref() {
            return Err(Error::new(
                StatusCode::BadNoValidCertificates,
                "Supplied thumbprint does not match application certificate's thumbprint",
            ));
        }

        // Copy message and security header.
        dst[..encrypted_range.start].copy_from_slice(&src[..encrypted_range.start]);

        // The decrypted block is shorter than the encrypted one, the ranges shift
        // accordingly.
        let encrypted_size = encrypted_range.end - encrypted_range.start;
        let mut decrypted_tmp = vec![0u8; encrypted_size];

        let private_key = self.private_key.as_ref().ok_or_else(|| {
            Error::new(
                StatusCode::BadSecurityChecksFailed,
                "No private key available to decrypt with",
            )
        })?;
        let decrypted_size = security_policy
            .asymmetric_decrypt(private_key, &src[encrypted_range.clone()], &mut decrypted_tmp)
            .map_err(|s| Error::new(s, "Asymmetric decrypt of chunk failed"))?;

        dst[encrypted_range.start..(encrypted_range.start + decrypted_size)]
            .copy_from_slice(&decrypted_tmp[0..decrypted_size]);

        let verification_key_signature_size = verification_key.size();

        // The signature sits at the end of the decrypted content.
        let signature_dst_offset =
            encrypted_range.start + decrypted_size - verification_key_signature_size;
        let signature_range_dst =
            signature_dst_offset..(signature_dst_offset + verification_key_signature_size);
        let signed_range_dst = 0..signature_dst_offset;

        security_policy.asymmetric_verify_signature(
            verification_key,
            &dst[signed_range_dst],
            &dst[signature_range_dst.clone()],
        )?;

        // Padding length bytes depend on the size of our public key.
        let key_size = match our_cert.public_key() {
            Ok(key) => key.size(),
            Err(_) => verification_key.size(),
        };
        let padding_range = self.verify_padding(dst, key_size, signature_range_dst.start)?;

        Ok(padding_range.start)
    }

    fn local_keys(&self) -> Result<&(Vec<u8>, AesKey, Vec<u8>), Error> {
        self.local_keys.as_ref().ok_or_else(|| {
            Error::new(
                StatusCode::BadSecureChannelClosed,
                "Channel has no derived local keys",
            )
        })
    }

    fn insert_remote_keys(&mut self, keys: (Vec<u8>, AesKey, Vec<u8>)) {
        // Drop keys of tokens that have passed their grace window.
        self.remote_keys
            .retain(|_, v| DateTime::now() < v.expires_at);

        // The server may secure messages with the retiring token for up to 25% of the
        // token lifetime past renewal, so keys expire at 125% of their lifetime.
        let expires_at = (self.token_lifetime as f32 * 1.25).ceil();
        let expires_at = Duration::milliseconds(expires_at as i64);

        self.remote_keys.insert(
            self.token_id,
            RemoteKeys {
                keys,
                expires_at: self.token_created_at + expires_at,
            },
        );
    }

    fn get_remote_keys(&self, token_id: u32) -> Option<&(Vec<u8>, AesKey, Vec<u8>)> {
        self.remote_keys.get(&token_id).map(|k| &k.keys)
    }

    fn encryption_keys(&self) -> Result<(&AesKey, &[u8]), Error> {
        let keys = self.local_keys()?;
        Ok((&keys.1, &keys.2))
    }

    fn signing_key(&self) -> Result<&[u8], Error> {
        Ok(&self.local_keys()?.0)
    }

    fn decryption_keys(&self, token_id: u32) -> Option<(&AesKey, &[u8])> {
        let keys = self.get_remote_keys(token_id)?;
        Some((&keys.1, &keys.2))
    }

    fn verification_key(&self, token_id: u32) -> Option<&[u8]> {
        Some(&(self.get_remote_keys(token_id))?.0)
    }

    /// Symmetrically sign, and for SignAndEncrypt encrypt, the chunk into `dst`.
    pub fn symmetric_sign_and_encrypt(
        &self,
        src: &mut [u8],
        signed_range: Range<usize>,
        encrypted_range: Range<usize>,
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let encrypted_size = match self.security_mode {
            MessageSecurityMode::None => {
                dst.copy_from_slice(src);
                src.len()
            }
            MessageSecurityMode::Sign => {
                let size = self
                    .symmetric_sign_in_place(src, signed_range)
                    .map_err(|e| e.status())?;
                dst[0..size].copy_from_slice(&src[0..size]);
                size
            }
            MessageSecurityMode::SignAndEncrypt => {
                self.symmetric_sign_in_place(src, signed_range)
                    .map_err(|e| e.status())?;

                // Encrypt the sequence header, payload, padding and signature.
                let (key, iv) = self.encryption_keys().map_err(|e| e.status())?;
                let encrypted_size = self.security_policy.symmetric_encrypt(
                    key,
                    iv,
                    &src[encrypted_range.clone()],
                    &mut dst[encrypted_range.start..],
                )?;
                // Copy the message header / security header
                dst[..encrypted_range.start].copy_from_slice(&src[..encrypted_range.start]);

                encrypted_range.start + encrypted_size
            }
            MessageSecurityMode::Invalid => {
                error!("Message security mode is invalid");
                return Err(StatusCode::BadSecurityChecksFailed);
            }
        };
        Ok(encrypted_size)
    }

    fn symmetric_sign_in_place(
        &self,
        buf: &mut [u8],
        signed_range: Range<usize>,
    ) -> Result<usize, Error> {
        let signature_size = self.security_policy.symmetric_signature_size();

        // Sign the message header, security header, sequence header, body, padding.
        let signing_key = self.signing_key()?;
        let (l, r) = buf.split_at_mut(signed_range.end);
        self.security_policy
            .symmetric_sign(signing_key, l, &mut r[0..signature_size])
            .map_err(|s| Error::new(s, "Symmetric signing failed"))?;

        Ok(signed_range.end + signature_size)
    }

    /// Decrypts and verifies a symmetric chunk, accepting either the active token's keys
    /// or a retired token inside the renewal grace window. Returns the size of the
    /// decrypted data without padding and signature.
    pub fn symmetric_decrypt_and_verify(
        &self,
        src: &[u8],
        signed_range: Range<usize>,
        encrypted_range: Range<usize>,
        token_id: u32,
        dst: &mut [u8],
    ) -> Result<usize, Error> {
        match self.security_mode {
            MessageSecurityMode::None => {
                dst[..].copy_from_slice(src);
                Ok(src.len())
            }
            MessageSecurityMode::Sign => {
                dst.copy_from_slice(src);
                let signature_range = signed_range.end..src.len();
                let verification_key = self.verification_key(token_id).ok_or_else(|| {
                    Error::new(
                        StatusCode::BadSecureChannelTokenUnknown,
                        format!("No verification key for token {}", token_id),
                    )
                })?;
                self.security_policy.symmetric_verify_signature(
                    verification_key,
                    &dst[signed_range.clone()],
                    &dst[signature_range],
                )?;

                Ok(signed_range.end)
            }
            MessageSecurityMode::SignAndEncrypt => {
                let ciphertext_size = encrypted_range.end - encrypted_range.start;

                // Copy message and security headers.
                dst[..encrypted_range.start].copy_from_slice(&src[..encrypted_range.start]);

                // Decrypt encrypted portion. The tmp buffer includes an extra block for
                // the cipher's scratch space.
                let mut decrypted_tmp = vec![0u8; ciphertext_size + 16];
                let (key, iv) = self.decryption_keys(token_id).ok_or_else(|| {
                    Error::new(
                        StatusCode::BadSecureChannelTokenUnknown,
                        format!("No decryption keys for token {}", token_id),
                    )
                })?;

                let decrypted_size = self.security_policy.symmetric_decrypt(
                    key,
                    iv,
                    &src[encrypted_range.clone()],
                    &mut decrypted_tmp[..],
                )
                .map_err(|s| Error::new(s, "Symmetric decrypt of chunk failed"))?;

                let encrypted_range =
                    encrypted_range.start..(encrypted_range.start + decrypted_size);
                dst[encrypted_range.clone()].copy_from_slice(&decrypted_tmp[..decrypted_size]);
                crate::log_buffer("Decrypted buffer", &dst[..encrypted_range.end]);

                // Verify signature, which trails the encrypted region.
                let signature_range = (encrypted_range.end
                    - self.security_policy.symmetric_signature_size())
                    ..encrypted_range.end;
                let verification_key = self.verification_key(token_id).ok_or_else(|| {
                    Error::new(
                        StatusCode::BadSecureChannelTokenUnknown,
                        format!("No verification key for token {}", token_id),
                    )
                })?;
                let signature_start = signature_range.start;
                self.security_policy.symmetric_verify_signature(
                    verification_key,
                    &dst[signed_range],
                    &dst[signature_range],
                )?;

                let key_size = key.key_length();
                let padding_range = self.verify_padding(dst, key_size, signature_start)?;

                // Decrypted range minus padding and signature.
                Ok(padding_range.start)
            }
            MessageSecurityMode::Invalid => Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "Message security mode is invalid",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::message_chunk::{MessageChunk, MessageChunkType, MessageIsFinalType};

    fn nonce() -> Vec<u8> {
        let mut nonce = vec![0u8; 32];
        uastack_crypto::random::bytes(&mut nonce);
        nonce
    }

    // Two channels whose nonces mirror each other, as they would after a real
    // OpenSecureChannel exchange. What `local` secures, `remote` can verify.
    fn connected_pair(
        mode: MessageSecurityMode,
        token_id: u32,
    ) -> (SecureChannel, SecureChannel) {
        let local_nonce = nonce();
        let remote_nonce = nonce();
        let make = |ours: &[u8], theirs: &[u8]| {
            let mut channel = SecureChannel::new_no_certificate_store();
            channel.set_security_policy(SecurityPolicy::Basic256Sha256);
            channel.set_security_mode(mode);
            channel.set_security_token(ChannelSecurityToken {
                channel_id: 1,
                token_id,
                created_at: DateTime::now(),
                revised_lifetime: 60_000,
            });
            channel.set_local_nonce(ours);
            channel
                .set_remote_nonce_from_byte_string(&ByteString::from(theirs))
                .unwrap();
            channel.derive_keys();
            channel
        };
        (
            make(&local_nonce, &remote_nonce),
            make(&remote_nonce, &local_nonce),
        )
    }

    fn make_chunk(channel: &SecureChannel, body: &[u8]) -> MessageChunk {
        MessageChunk::new(
            1,
            1,
            MessageChunkType::Message,
            MessageIsFinalType::Final,
            channel,
            body,
        )
        .unwrap()
    }

    #[test]
    fn symmetric_sign_and_encrypt_round_trip() {
        let (local, mut remote) = connected_pair(MessageSecurityMode::SignAndEncrypt, 1);
        let body = (0..200).map(|i| i as u8).collect::<Vec<_>>();
        let chunk = make_chunk(&local, &body);

        let mut secured = vec![0u8; chunk.data.len() + 1024];
        let secured_size = local.apply_security(&chunk, &mut secured).unwrap();
        // Encrypted output must differ from the plain chunk past the headers.
        assert_ne!(&secured[..secured_size], &chunk.data[..]);

        let decrypted = remote
            .verify_and_remove_security(&secured[..secured_size])
            .unwrap();
        assert_eq!(&decrypted.data[..], &chunk.data[..]);
    }

    #[test]
    fn symmetric_sign_only_round_trip() {
        let (local, mut remote) = connected_pair(MessageSecurityMode::Sign, 1);
        let body = [7u8; 61];
        let chunk = make_chunk(&local, &body);

        let mut secured = vec![0u8; chunk.data.len() + 64];
        let secured_size = local.apply_security(&chunk, &mut secured).unwrap();
        // Sign-only keeps the payload in plain text and appends a signature; only the
        // size field of the header changes.
        assert_eq!(secured_size, chunk.data.len() + 32);
        assert_eq!(&secured[8..chunk.data.len()], &chunk.data[8..]);

        let decrypted = remote
            .verify_and_remove_security(&secured[..secured_size])
            .unwrap();
        assert_eq!(&decrypted.data[..], &chunk.data[..]);
    }

    #[test]
    fn tampered_chunk_is_rejected() {
        let (local, mut remote) = connected_pair(MessageSecurityMode::Sign, 1);
        let chunk = make_chunk(&local, &[1, 2, 3, 4]);

        let mut secured = vec![0u8; chunk.data.len() + 64];
        let secured_size = local.apply_security(&chunk, &mut secured).unwrap();
        // Flip a byte in the body.
        secured[chunk.data.len() - 1] ^= 0xff;
        let err = remote
            .verify_and_remove_security(&secured[..secured_size])
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BadSecurityChecksFailed);
    }

    #[test]
    fn old_token_accepted_within_grace_window() {
        let (local, mut remote) = connected_pair(MessageSecurityMode::SignAndEncrypt, 1);
        let chunk = make_chunk(&local, &[9u8; 32]);
        let mut secured = vec![0u8; chunk.data.len() + 1024];
        let secured_size = local.apply_security(&chunk, &mut secured).unwrap();

        // Renew on the receive side: token 2, fresh nonces. Keys for token 1 stay
        // registered for the grace window.
        remote.set_security_token(ChannelSecurityToken {
            channel_id: 1,
            token_id: 2,
            created_at: DateTime::now(),
            revised_lifetime: 60_000,
        });
        remote.set_local_nonce(&nonce());
        remote
            .set_remote_nonce_from_byte_string(&ByteString::from(nonce()))
            .unwrap();
        remote.derive_keys();

        // A message secured under token 1 must still decrypt.
        let decrypted = remote
            .verify_and_remove_security(&secured[..secured_size])
            .unwrap();
        assert_eq!(&decrypted.data[..], &chunk.data[..]);

        // A token the channel has never seen is refused. The symmetric security header
        // sits directly after the 12 byte chunk header and is not encrypted.
        let mut secured = vec![0u8; chunk.data.len() + 1024];
        let size = local.apply_security(&make_chunk(&local, &[1u8; 16]), &mut secured).unwrap();
        secured[12..16].copy_from_slice(&99u32.to_le_bytes());
        assert!(remote.verify_and_remove_security(&secured[..size]).is_err());
    }

    #[test]
    fn renewal_due_at_75_percent() {
        let mut channel = SecureChannel::new_no_certificate_store();
        channel.set_security_token(ChannelSecurityToken {
            channel_id: 1,
            token_id: 1,
            created_at: DateTime::now() - Duration::milliseconds(7_600),
            revised_lifetime: 10_000,
        });
        assert!(channel.should_renew_security_token());

        channel.set_security_token(ChannelSecurityToken {
            channel_id: 1,
            token_id: 1,
            created_at: DateTime::now(),
            revised_lifetime: 10_000,
        });
        assert!(!channel.should_renew_security_token());
    }
}
