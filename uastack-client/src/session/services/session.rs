//! Session services: CreateSession, ActivateSession, CloseSession and Cancel, plus the
//! user identity token encoding.

use std::sync::Arc;
use std::time::Duration;

use log::error;
use parking_lot::RwLock;

use uastack_core::{
    comms::{secure_channel::SecureChannel, url::hostname_from_url},
    trace_read_lock, trace_write_lock, ResponseMessage,
};
use uastack_crypto::{
    create_signature_data, make_user_name_identity_token, verify_signature_data, CertificateStore,
    PrivateKey, SecurityPolicy, X509,
};
use uastack_types::{
    ActivateSessionRequest, ActivateSessionResponse, AnonymousIdentityToken,
    ApplicationDescription, ByteString, CancelRequest, CancelResponse, CloseSessionRequest,
    CloseSessionResponse, CreateSessionRequest, CreateSessionResponse, EndpointDescription,
    ExtensionObject, IntegerId, IssuedIdentityToken, NodeId, SignatureData,
    SignedSoftwareCertificate, StatusCode, UAString, UserTokenType, X509IdentityToken,
};

use crate::{
    session::{
        process_service_result, process_unexpected_response,
        request_builder::{builder_base, builder_error, RequestHeaderBuilder},
    },
    AsyncSecureChannel, IdentityToken, Session, UARequest,
};

#[derive(Clone)]
/// Sends a [`CreateSessionRequest`] to the server, returning the id of the created
/// session. The session stores the authentication token, which is stamped into all
/// subsequent requests.
///
/// See OPC UA Part 4 - Services 5.6.2 for a complete description of the service and
/// error responses.
///
/// Note: avoid calling this on sessions managed by the [`Session`] type. Session
/// creation is handled automatically as part of connect/reconnect logic.
pub struct CreateSession<'a> {
    client_description: ApplicationDescription,
    server_uri: UAString,
    endpoint_url: UAString,
    session_name: UAString,
    client_certificate: ByteString,
    session_timeout: f64,
    max_response_message_size: u32,
    certificate_store: &'a RwLock<CertificateStore>,
    endpoint: &'a EndpointDescription,

    header: RequestHeaderBuilder,
}

builder_base!(CreateSession<'a>);

impl<'a> CreateSession<'a> {
    /// Create a new `CreateSession` request on the given session.
    pub(crate) fn new(session: &'a Session) -> Self {
        Self {
            endpoint_url: session.session_info.endpoint.endpoint_url.clone(),
            server_uri: UAString::null(),
            client_description: session.application_description.clone(),
            session_name: session.session_name.clone(),
            client_certificate: {
                let cert_store = trace_read_lock!(session.certificate_store);
                cert_store
                    .read_own_cert()
                    .ok()
                    .map(|m| m.as_byte_string())
                    .unwrap_or_default()
            },
            endpoint: &session.session_info.endpoint,
            certificate_store: &session.certificate_store,
            session_timeout: session.session_timeout,
            max_response_message_size: 0,
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }

    /// Set the client application description.
    pub fn client_description(mut self, desc: impl Into<ApplicationDescription>) -> Self {
        self.client_description = desc.into();
        self
    }

    /// Set the session name.
    pub fn session_name(mut self, session_name: impl Into<UAString>) -> Self {
        self.session_name = session_name.into();
        self
    }

    /// Set the requested session timeout in milliseconds.
    pub fn session_timeout(mut self, session_timeout: f64) -> Self {
        self.session_timeout = session_timeout;
        self
    }
}

impl UARequest for CreateSession<'_> {
    type Out = CreateSessionResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = CreateSessionRequest {
            request_header: self.header.header,
            client_description: self.client_description,
            server_uri: self.server_uri,
            endpoint_url: self.endpoint_url,
            session_name: self.session_name,
            client_nonce: channel.client_nonce(),
            client_certificate: self.client_certificate.clone(),
            requested_session_timeout: self.session_timeout,
            max_response_message_size: self.max_response_message_size,
        };
        let client_nonce = request.client_nonce.clone();
        let response = channel.send(request, self.header.timeout).await?;

        let ResponseMessage::CreateSession(response) = response else {
            error!("create_session failed");
            return Err(process_unexpected_response(response));
        };
        log::debug!("create_session, success");
        process_service_result(&response.response_header)?;

        let security_policy = channel.security_policy();

        if security_policy != SecurityPolicy::None {
            let Ok(server_certificate) = X509::from_byte_string(&response.server_certificate)
            else {
                return Err(StatusCode::BadCertificateInvalid);
            };

            // The returned certificate must check out against the trust list, the
            // hostname in the endpoint url and the advertised application uri.
            let hostname = hostname_from_url(self.endpoint.endpoint_url.as_ref())
                .map_err(|_| StatusCode::BadUnexpectedError)?;
            let application_uri = self.endpoint.server.application_uri.as_ref();

            {
                let certificate_store = trace_write_lock!(self.certificate_store);
                certificate_store.validate_or_reject_application_instance_cert(
                    &server_certificate,
                    security_policy,
                    Some(&hostname),
                    Some(application_uri),
                )?;
            }

            // The server proves possession of its private key by signing our
            // certificate and nonce.
            verify_signature_data(
                &response.server_signature,
                security_policy,
                &server_certificate,
                &self.client_certificate,
                &client_nonce,
            )
            .map_err(|e| e.status())?;
        }

        channel.update_from_created_session(
            &response.server_nonce,
            &response.server_certificate,
        )?;

        Ok(*response)
    }
}

#[derive(Debug, Clone)]
/// Sends an [`ActivateSessionRequest`] to the server to activate the session tied to
/// the secure channel.
///
/// See OPC UA Part 4 - Services 5.6.3 for a complete description of the service and
/// error responses.
///
/// Note: avoid calling this on sessions managed by the [`Session`] type. Session
/// activation is handled automatically as part of connect/reconnect logic.
pub struct ActivateSession {
    identity_token: IdentityToken,
    private_key: Option<PrivateKey>,
    locale_ids: Vec<UAString>,
    client_software_certificates: Vec<SignedSoftwareCertificate>,
    endpoint: EndpointDescription,

    header: RequestHeaderBuilder,
}

builder_base!(ActivateSession);

impl ActivateSession {
    /// Create a new `ActivateSession` request.
    pub(crate) fn new(session: &Session) -> Self {
        Self {
            identity_token: session.session_info.user_identity_token.clone(),
            private_key: {
                let cert_store = trace_read_lock!(session.certificate_store);
                cert_store.read_own_pkey().ok()
            },
            locale_ids: session
                .session_info
                .preferred_locales
                .iter()
                .map(UAString::from)
                .collect(),
            client_software_certificates: Vec::new(),
            endpoint: session.session_info.endpoint.clone(),
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }

    /// Set the identity token.
    pub fn identity_token(mut self, identity_token: IdentityToken) -> Self {
        self.identity_token = identity_token;
        self
    }

    /// Set the requested list of locales.
    pub fn locale_ids(mut self, locale_ids: Vec<UAString>) -> Self {
        self.locale_ids = locale_ids;
        self
    }

    fn user_identity_token(
        &self,
        secure_channel: &SecureChannel,
    ) -> Result<(ExtensionObject, SignatureData), StatusCode> {
        let user_token_type = match &self.identity_token {
            IdentityToken::Anonymous => UserTokenType::Anonymous,
            IdentityToken::UserName(_, _) => UserTokenType::UserName,
            IdentityToken::X509(_, _) => UserTokenType::Certificate,
            IdentityToken::Issued(_) => UserTokenType::IssuedToken,
        };
        let Some(policy) = self.endpoint.find_policy(user_token_type) else {
            builder_error!(
                self,
                "Endpoint has no user token policy of type {:?}, cannot activate",
                user_token_type
            );
            return Err(StatusCode::BadIdentityTokenRejected);
        };
        let security_policy = if policy.security_policy_uri.is_null() {
            // No explicit policy on the token, the channel policy applies.
            SecurityPolicy::None
        } else {
            SecurityPolicy::from_uri(policy.security_policy_uri.as_ref())
        };

        if security_policy == SecurityPolicy::Unknown {
            error!("Unknown security policy {}", policy.security_policy_uri);
            return Err(StatusCode::BadSecurityPolicyRejected);
        }

        match &self.identity_token {
            IdentityToken::Anonymous => {
                let identity_token = AnonymousIdentityToken {
                    policy_id: policy.policy_id.clone(),
                };
                Ok((
                    ExtensionObject::from_message(identity_token),
                    SignatureData::null(),
                ))
            }
            IdentityToken::UserName(user, pass) => {
                let channel_security_policy = secure_channel.security_policy();
                let nonce = secure_channel.remote_nonce();
                let cert = secure_channel.remote_cert();
                let identity_token = make_user_name_identity_token(
                    channel_security_policy,
                    policy,
                    nonce,
                    &cert,
                    user,
                    pass,
                )
                .map_err(|e| e.status())?;
                Ok((
                    ExtensionObject::from_message(identity_token),
                    SignatureData::null(),
                ))
            }
            IdentityToken::X509(cert_path, private_key_path) => {
                let Some(server_cert) = secure_channel.remote_cert() else {
                    error!("Cannot create an X509IdentityToken, the server certificate is unavailable for the signature");
                    return Err(StatusCode::BadCertificateInvalid);
                };
                let nonce = secure_channel.remote_nonce();

                let user_certificate = CertificateStore::read_cert(cert_path).map_err(|e| {
                    error!(
                        "User certificate cannot be loaded from {}: {e}",
                        cert_path.display()
                    );
                    StatusCode::BadIdentityTokenInvalid
                })?;
                let user_key = CertificateStore::read_pkey(private_key_path).map_err(|e| {
                    error!(
                        "User private key cannot be loaded from {}: {e}",
                        private_key_path.display()
                    );
                    StatusCode::BadIdentityTokenInvalid
                })?;

                // The proof of possession: the user's key signs the server's
                // certificate and nonce.
                let user_token_signature = create_signature_data(
                    &user_key,
                    security_policy,
                    &server_cert.as_byte_string(),
                    &ByteString::from(nonce),
                )?;

                let identity_token = X509IdentityToken {
                    policy_id: policy.policy_id.clone(),
                    certificate_data: user_certificate.as_byte_string(),
                };

                Ok((
                    ExtensionObject::from_message(identity_token),
                    user_token_signature,
                ))
            }
            IdentityToken::Issued(token_data) => {
                let identity_token = IssuedIdentityToken {
                    policy_id: policy.policy_id.clone(),
                    token_data: ByteString::from(token_data),
                    encryption_algorithm: UAString::null(),
                };
                Ok((
                    ExtensionObject::from_message(identity_token),
                    SignatureData::null(),
                ))
            }
        }
    }

    fn build_request(
        self,
        channel: &AsyncSecureChannel,
    ) -> Result<ActivateSessionRequest, StatusCode> {
        let secure_channel = trace_read_lock!(channel.secure_channel);
        let (user_identity_token, user_token_signature) =
            self.user_identity_token(&secure_channel)?;
        let security_policy = secure_channel.security_policy();
        let client_signature = match security_policy {
            SecurityPolicy::None => SignatureData::null(),
            _ => {
                let Some(client_pkey) = self.private_key else {
                    error!("Cannot create client signature - no private key!");
                    return Err(StatusCode::BadUnexpectedError);
                };

                let Some(server_cert) = secure_channel.remote_cert() else {
                    error!("Cannot sign server certificate because the server cert is null");
                    return Err(StatusCode::BadUnexpectedError);
                };

                let server_nonce = secure_channel.remote_nonce_as_byte_string();
                if server_nonce.is_empty() {
                    error!("Cannot sign server certificate because the server nonce is empty");
                    return Err(StatusCode::BadUnexpectedError);
                }

                create_signature_data(
                    &client_pkey,
                    security_policy,
                    &server_cert.as_byte_string(),
                    &server_nonce,
                )?
            }
        };

        Ok(ActivateSessionRequest {
            request_header: self.header.header,
            client_signature,
            client_software_certificates: if self.client_software_certificates.is_empty() {
                None
            } else {
                Some(self.client_software_certificates)
            },
            locale_ids: if self.locale_ids.is_empty() {
                None
            } else {
                Some(self.locale_ids)
            },
            user_identity_token,
            user_token_signature,
        })
    }
}

impl UARequest for ActivateSession {
    type Out = ActivateSessionResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let timeout = self.header.timeout;
        let request = self.build_request(channel)?;

        let response = channel.send(request, timeout).await?;

        if let ResponseMessage::ActivateSession(response) = response {
            log::debug!("activate_session success");
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            log::error!("activate_session failed");
            Err(process_unexpected_response(response))
        }
    }
}

#[derive(Debug, Clone)]
/// Close the session by sending a [`CloseSessionRequest`] to the server.
///
/// Note: avoid using this on a session managed by the [`Session`] type,
/// instead call [`Session::disconnect`].
pub struct CloseSession {
    delete_subscriptions: bool,
    header: RequestHeaderBuilder,
}

builder_base!(CloseSession);

impl CloseSession {
    /// Create a new `CloseSession` request.
    pub(crate) fn new(session: &Session) -> Self {
        Self {
            delete_subscriptions: true,
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }

    /// Set `DeleteSubscriptions`, indicating to the server whether it should
    /// delete subscriptions immediately or let them run out.
    pub fn delete_subscriptions(mut self, delete_subscriptions: bool) -> Self {
        self.delete_subscriptions = delete_subscriptions;
        self
    }
}

impl UARequest for CloseSession {
    type Out = CloseSessionResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = CloseSessionRequest {
            delete_subscriptions: self.delete_subscriptions,
            request_header: self.header.header,
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::CloseSession(response) = response {
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            error!("close_session failed {:?}", response);
            Err(process_unexpected_response(response))
        }
    }
}

#[derive(Debug, Clone)]
/// Cancels an outstanding service request by sending a [`CancelRequest`] to the server.
///
/// See OPC UA Part 4 - Services 5.6.5 for a complete description of the service and
/// error responses.
pub struct Cancel {
    request_handle: IntegerId,
    header: RequestHeaderBuilder,
}

builder_base!(Cancel);

impl Cancel {
    /// Create a new cancel request, to cancel a running service call.
    pub fn new(request_to_cancel: IntegerId, session: &Session) -> Self {
        Self {
            request_handle: request_to_cancel,
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }
}

impl UARequest for Cancel {
    type Out = CancelResponse;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        let request = CancelRequest {
            request_header: self.header.header,
            request_handle: self.request_handle,
        };

        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::Cancel(response) = response {
            process_service_result(&response.response_header)?;
            Ok(*response)
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

impl Session {
    /// Sends a [`CreateSessionRequest`] to the server, returning the id of the created
    /// session. The authentication token is stored and used for all subsequent requests.
    pub(crate) async fn create_session(&self) -> Result<NodeId, StatusCode> {
        let response = CreateSession::new(self).send(&self.channel).await?;

        let session_id = response.session_id.clone();
        self.session_id.store(Arc::new(session_id.clone()));
        self.auth_token
            .store(Arc::new(response.authentication_token));

        Ok(session_id)
    }

    /// Sends an [`ActivateSessionRequest`] to the server to activate this session.
    pub(crate) async fn activate_session(&self) -> Result<(), StatusCode> {
        ActivateSession::new(self).send(&self.channel).await?;
        Ok(())
    }

    /// Close the session. Not accessible directly, users call `disconnect` which also
    /// winds down the secure channel.
    pub(crate) async fn close_session(&self, delete_subscriptions: bool) -> Result<(), StatusCode> {
        CloseSession::new(self)
            .delete_subscriptions(delete_subscriptions)
            .send(&self.channel)
            .await?;
        Ok(())
    }

    /// Cancels an outstanding service request by sending a [`CancelRequest`] to the
    /// server, returning the number of cancelled requests.
    ///
    /// See OPC UA Part 4 - Services 5.6.5 for a complete description of the service.
    pub async fn cancel(&self, request_handle: IntegerId) -> Result<u32, StatusCode> {
        Ok(Cancel::new(request_handle, self)
            .send(&self.channel)
            .await?
            .cancel_count)
    }
}
