//! The [`Client`] façade: configuration, the certificate store, the discovery
//! pre-flight, and construction of sessions against named endpoints.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use parking_lot::RwLock;

use uastack_core::comms::url::server_url_from_endpoint_url;
use uastack_core::{RequestMessage, ResponseMessage};
use uastack_crypto::{CertificateStore, SecurityPolicy};
use uastack_types::{
    ApplicationDescription, EndpointDescription, GetEndpointsRequest, FindServersRequest,
    MessageSecurityMode, StatusCode, UAString,
};

use crate::{
    config::ClientConfig,
    transport::{AsyncSecureChannel, TcpConnector},
    ClientBuilder, IdentityToken,
};

use super::{
    implementation::SessionBuilder, process_unexpected_response, Session, SessionEventLoop,
    SessionInfo,
};

/// The entry point of the client side: holds the configuration and certificate store,
/// discovers servers and endpoints, and builds sessions against configured endpoints.
pub struct Client {
    config: ClientConfig,
    certificate_store: Arc<RwLock<CertificateStore>>,
}

impl Client {
    /// Create a client from configuration. Prefer [`ClientBuilder`] for building the
    /// configuration in code.
    pub fn new(config: ClientConfig) -> Client {
        let mut certificate_store = CertificateStore::new(&config.pki_dir);
        if config.trust_server_certs {
            certificate_store.set_trust_unknown_certs(true);
        }
        Client {
            config,
            certificate_store: Arc::new(RwLock::new(certificate_store)),
        }
    }

    /// The client's configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The certificate store.
    pub fn certificate_store(&self) -> Arc<RwLock<CertificateStore>> {
        self.certificate_store.clone()
    }

    /// Begin building a session from a list of server endpoints.
    pub fn session_builder(&self, endpoints: Vec<EndpointDescription>) -> SessionBuilder<'_> {
        SessionBuilder::new(&self.config, endpoints)
    }

    /// Connect to the endpoint configured under `endpoint_id`, running the discovery
    /// pre-flight to fill in the server certificate and select the concrete endpoint.
    ///
    /// Returns the session and its event loop. Nothing happens until the event loop is
    /// polled or spawned.
    pub async fn connect_to_endpoint_id(
        &self,
        endpoint_id: &str,
    ) -> Result<(Arc<Session>, SessionEventLoop), StatusCode> {
        let id = if endpoint_id.is_empty() {
            &self.config.default_endpoint
        } else {
            endpoint_id
        };
        let Some(endpoint) = self.config.endpoints.get(id) else {
            error!("No endpoint with id {id} is configured");
            return Err(StatusCode::BadConfigurationError);
        };
        let identity = self
            .config
            .client_identity_token(&endpoint.user_token_id)
            .ok_or(StatusCode::BadConfigurationError)?;

        // Discovery pre-flight over an unsecured channel.
        let server_endpoints = self.get_server_endpoints_from_url(&endpoint.url).await?;

        let security_policy = SecurityPolicy::from_str(&endpoint.security_policy)
            .map_err(|_| StatusCode::BadSecurityPolicyRejected)?;
        let builder = self
            .session_builder(server_endpoints)
            .user_identity_token(identity);
        let builder = if endpoint.security_policy.is_empty() {
            // No policy preference: the strongest advertised endpoint wins.
            builder.connect_to_best_endpoint(true)?
        } else {
            builder.connect_to_matching_endpoint(EndpointDescription::from((
                endpoint.url.as_str(),
                security_policy.to_uri(),
                endpoint.security_mode(),
            )))?
        };
        Ok(builder.build(self.certificate_store.clone()))
    }

    /// Connect to the default configured endpoint.
    pub async fn connect_to_default_endpoint(
        &self,
    ) -> Result<(Arc<Session>, SessionEventLoop), StatusCode> {
        self.connect_to_endpoint_id("").await
    }

    /// Connect directly to an endpoint description with the given identity, skipping
    /// both the configured endpoint map and discovery. The endpoint must carry the
    /// server certificate if the security policy is not None.
    pub fn connect_to_endpoint_directly(
        &self,
        endpoint: impl Into<EndpointDescription>,
        identity_token: IdentityToken,
    ) -> Result<(Arc<Session>, SessionEventLoop), StatusCode> {
        let builder = SessionBuilder::new(&self.config, Vec::new())
            .user_identity_token(identity_token)
            .connect_to_endpoint_directly(endpoint)?;
        Ok(builder.build(self.certificate_store.clone()))
    }

    /// Ask the server at the configured default endpoint for its endpoints.
    pub async fn get_server_endpoints(&self) -> Result<Vec<EndpointDescription>, StatusCode> {
        let Some(endpoint) = self.config.endpoints.get(&self.config.default_endpoint) else {
            error!("Cannot get endpoints, no default endpoint is configured");
            return Err(StatusCode::BadConfigurationError);
        };
        self.get_server_endpoints_from_url(&endpoint.url).await
    }

    /// Ask the server at `server_url` for its endpoints. This opens a temporary
    /// unsecured channel, issues GetEndpoints and closes the channel again.
    pub async fn get_server_endpoints_from_url(
        &self,
        server_url: &str,
    ) -> Result<Vec<EndpointDescription>, StatusCode> {
        let request = GetEndpointsRequest {
            request_header: Default::default(),
            endpoint_url: UAString::from(server_url),
            locale_ids: None,
            profile_uris: None,
        };
        let response = self.discovery_request(server_url, request.into()).await?;
        if let ResponseMessage::GetEndpoints(response) = response {
            Ok(response.endpoints.unwrap_or_default())
        } else {
            Err(process_unexpected_response(response))
        }
    }

    /// Ask a discovery server for the applications it knows about.
    pub async fn find_servers(
        &self,
        discovery_url: &str,
    ) -> Result<Vec<ApplicationDescription>, StatusCode> {
        let request = FindServersRequest {
            request_header: Default::default(),
            endpoint_url: UAString::from(discovery_url),
            locale_ids: None,
            server_uris: None,
        };
        let response = self.discovery_request(discovery_url, request.into()).await?;
        if let ResponseMessage::FindServers(response) = response {
            Ok(response.servers.unwrap_or_default())
        } else {
            Err(process_unexpected_response(response))
        }
    }

    /// Run one request against a server over a temporary None/None secure channel.
    async fn discovery_request(
        &self,
        server_url: &str,
        mut request: RequestMessage,
    ) -> Result<ResponseMessage, StatusCode> {
        let server_url =
            server_url_from_endpoint_url(server_url).map_err(|_| StatusCode::BadTcpEndpointUrlInvalid)?;
        debug!("Discovery request to {server_url}");

        let endpoint = EndpointDescription::from((
            server_url.as_str(),
            SecurityPolicy::None.to_uri(),
            MessageSecurityMode::None,
        ));
        let channel = AsyncSecureChannel::new(
            self.certificate_store.clone(),
            SessionInfo::from(endpoint),
            crate::retry::SessionRetryPolicy::never(),
            self.config.ignore_clock_skew,
            Default::default(),
            crate::transport::TransportConfiguration {
                max_pending_incoming: self.config.limits.max_chunk_count,
                send_buffer_size: self.config.limits.send_buffer_size,
                recv_buffer_size: self.config.limits.receive_buffer_size,
                max_message_size: self.config.limits.max_message_size,
                max_chunk_count: self.config.limits.max_chunk_count,
            },
            Box::new(TcpConnector),
            self.config.channel_lifetime_ms,
            Default::default(),
        );

        let mut event_loop = channel.connect_no_retry().await?;
        let timeout = Duration::from_millis(self.config.request_timeout_ms as u64);

        *request.request_header_mut() = channel.make_request_header(timeout);

        let send_fut = channel.send(request, timeout);
        tokio::pin!(send_fut);

        let result = loop {
            tokio::select! {
                r = &mut send_fut => break r,
                r = event_loop.poll() => {
                    if let crate::transport::TransportPollResult::Closed(e) = r {
                        return Err(e);
                    }
                }
            }
        };

        // Wind the channel down whatever the outcome.
        channel.close_channel().await;
        loop {
            if let crate::transport::TransportPollResult::Closed(_) = event_loop.poll().await {
                break;
            }
        }

        result
    }

    /// Find the advertised endpoint that matches the url, security policy and mode.
    /// The comparison ignores the hostname, servers frequently advertise themselves
    /// under a name that differs from the address used to reach them.
    pub fn find_matching_endpoint(
        endpoints: &[EndpointDescription],
        endpoint_url: &str,
        security_policy: SecurityPolicy,
        security_mode: MessageSecurityMode,
    ) -> Option<EndpointDescription> {
        let matching = endpoints.iter().find(|e| {
            SecurityPolicy::from_uri(e.security_policy_uri.as_ref()) == security_policy
                && e.security_mode == security_mode
        })?;
        let mut endpoint = matching.clone();
        // Talk to the address the caller supplied, not the advertised hostname.
        endpoint.endpoint_url = UAString::from(endpoint_url);
        Some(endpoint)
    }
}

impl From<ClientBuilder> for Client {
    fn from(builder: ClientBuilder) -> Self {
        Client::new(builder.config())
    }
}
