//! The [`Session`] type itself.

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;
use log::error;
use parking_lot::{Mutex, RwLock};

use uastack_core::comms::url::is_opc_ua_binary_url;
use uastack_crypto::{CertificateStore, SecurityPolicy};
use uastack_types::{
    ApplicationDescription, ContextOwned, DecodingOptions, DiagnosticBits, EndpointDescription,
    NamespaceMap, NodeId, RequestHeader, StatusCode, TypeLoader, UAString, VariableId, Variant,
};

use crate::{
    config::ClientConfig,
    retry::SessionRetryPolicy,
    transport::{AsyncSecureChannel, Connector, TransportConfiguration},
    IdentityToken,
};

use super::{
    services::subscriptions::state::SubscriptionState,
    session_error,
    SessionEventLoop, SessionInfo,
};

/// The connectedness of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The session has no secure channel and no attempt to connect is underway.
    Disconnected,
    /// The session is trying to establish a secure channel and activate itself.
    Connecting,
    /// The session is activated on a secure channel.
    Connected,
}

static NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);

/// An OPC UA session: the authenticated logical context requests run in. The session
/// survives secure channel faults, it is reactivated on the replacement channel by the
/// [`SessionEventLoop`].
pub struct Session {
    pub(crate) channel: AsyncSecureChannel,
    pub(crate) state_watch_rx: tokio::sync::watch::Receiver<SessionState>,
    pub(crate) state_watch_tx: tokio::sync::watch::Sender<SessionState>,
    pub(crate) certificate_store: Arc<RwLock<CertificateStore>>,
    /// The server-assigned session id, readable concurrently for logging.
    pub(crate) session_id: Arc<ArcSwap<NodeId>>,
    pub(crate) auth_token: Arc<ArcSwap<NodeId>>,
    pub(crate) session_info: SessionInfo,
    pub(crate) session_name: UAString,
    pub(crate) application_description: ApplicationDescription,
    pub(crate) session_timeout: f64,
    /// A number identifying this session object in logs, distinct from the server's id.
    session_ordinal: u32,
    request_timeout: Duration,
    publish_timeout: Duration,
    keep_alive_interval: Duration,
    max_failed_keep_alive_count: u64,
    pub(crate) subscription_state: Mutex<SubscriptionState>,
    monitored_item_handle: AtomicU32,
    pub(crate) trigger_publish_tx: tokio::sync::watch::Sender<Instant>,
    pub(crate) should_reconnect: AtomicBool,
    pub(crate) max_publish_requests: usize,
    return_diagnostics: DiagnosticBits,
    pub(crate) encoding_context: Arc<RwLock<ContextOwned>>,
    decoding_options: DecodingOptions,
}

impl Session {
    /// Create a session and its event loop from configuration. The session does nothing
    /// until the event loop is polled or spawned.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        certificate_store: Arc<RwLock<CertificateStore>>,
        session_info: SessionInfo,
        session_name: UAString,
        application_description: ApplicationDescription,
        session_retry_policy: SessionRetryPolicy,
        decoding_options: DecodingOptions,
        config: &ClientConfig,
        session_id: Option<NodeId>,
        connector: Box<dyn Connector>,
        type_loaders: Vec<Arc<dyn TypeLoader>>,
    ) -> (Arc<Self>, SessionEventLoop) {
        let auth_token: Arc<ArcSwap<NodeId>> = Default::default();
        let (state_watch_tx, state_watch_rx) =
            tokio::sync::watch::channel(SessionState::Disconnected);
        let (trigger_publish_tx, trigger_publish_rx) = tokio::sync::watch::channel(Instant::now());

        let encoding_context = Arc::new(RwLock::new({
            let mut ctx = ContextOwned::new_default(NamespaceMap::new(), decoding_options.clone());
            for loader in type_loaders {
                ctx.loaders_mut().add(loader);
            }
            ctx
        }));

        let transport_config = TransportConfiguration {
            // A message can legitimately arrive in up to max_chunk_count chunks.
            max_pending_incoming: config.limits.max_chunk_count,
            send_buffer_size: config.limits.send_buffer_size,
            recv_buffer_size: config.limits.receive_buffer_size,
            max_message_size: config.limits.max_message_size,
            max_chunk_count: config.limits.max_chunk_count,
        };

        let session_timeout = config.session_timeout_ms as f64;
        let keep_alive_interval = if config.keep_alive_interval_ms > 0 {
            Duration::from_millis(config.keep_alive_interval_ms as u64)
        } else {
            // Read the server state at a quarter of the session timeout so an idle
            // session cannot expire unnoticed.
            Duration::from_millis((config.session_timeout_ms / 4).max(1000) as u64)
        };

        let session = Arc::new(Session {
            channel: AsyncSecureChannel::new(
                certificate_store.clone(),
                session_info.clone(),
                session_retry_policy.clone(),
                config.ignore_clock_skew,
                auth_token.clone(),
                transport_config,
                connector,
                config.channel_lifetime_ms,
                encoding_context.clone(),
            ),
            state_watch_rx,
            state_watch_tx,
            certificate_store,
            session_id: Arc::new(ArcSwap::new(Arc::new(session_id.unwrap_or_default()))),
            auth_token,
            session_info,
            session_name,
            application_description,
            session_timeout,
            session_ordinal: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            request_timeout: Duration::from_millis(config.request_timeout_ms as u64),
            publish_timeout: Duration::from_millis(
                (config.request_timeout_ms as u64).max(60_000),
            ),
            keep_alive_interval,
            max_failed_keep_alive_count: config.max_failed_keep_alive_count,
            subscription_state: Mutex::new(SubscriptionState::new()),
            monitored_item_handle: AtomicU32::new(1),
            trigger_publish_tx,
            should_reconnect: AtomicBool::new(true),
            max_publish_requests: config.max_publish_requests.max(1),
            return_diagnostics: DiagnosticBits::from_bits_truncate(config.diagnostics_hint),
            encoding_context,
            decoding_options,
        });

        let event_loop = SessionEventLoop::new(
            session.clone(),
            session_retry_policy,
            trigger_publish_rx,
            session.keep_alive_interval,
            session.max_failed_keep_alive_count,
        );

        (session, event_loop)
    }

    /// A short identifier of this session for log messages.
    pub fn session_id(&self) -> String {
        format!("{}:{}", self.session_ordinal, self.session_id.load())
    }

    /// The server-assigned session id node.
    pub fn server_session_id(&self) -> NodeId {
        (**self.session_id.load()).clone()
    }

    /// The configured per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// The timeout applied to publish requests, which the server parks until it has
    /// notifications to deliver.
    pub(crate) fn publish_timeout(&self) -> Duration {
        self.publish_timeout
    }

    /// Construct a request header with the configured timeout and diagnostics hint.
    pub fn make_request_header(&self) -> RequestHeader {
        let mut header = self.channel.make_request_header(self.request_timeout);
        header.return_diagnostics = self.return_diagnostics;
        header
    }

    /// Allocate a new client handle for a monitored item. Handles are unique across the
    /// session so notifications can be demultiplexed without a linear scan.
    pub(crate) fn next_monitored_item_handle(&self) -> u32 {
        self.monitored_item_handle.fetch_add(1, Ordering::Relaxed)
    }

    /// Nudge the publish worker, e.g. after subscription counts change.
    pub(crate) fn trigger_publish(&self) {
        let _ = self.trigger_publish_tx.send(Instant::now());
    }

    /// Wait for the session to reach the connected state. Returns `false` if the
    /// session reaches a terminal failure first.
    pub async fn wait_for_connection(&self) -> bool {
        let mut rx = self.state_watch_rx.clone();
        loop {
            if *rx.borrow_and_update() == SessionState::Connected {
                return true;
            }
            if rx.changed().await.is_err() {
                return false;
            }
        }
    }

    /// The decoding options in use.
    pub fn decoding_options(&self) -> &DecodingOptions {
        &self.decoding_options
    }

    /// Fetch the server's namespace array and rebuild the namespace map used to resolve
    /// encoding ids. Called after activation.
    pub async fn read_namespace_array(&self) -> Result<(), StatusCode> {
        let result = self
            .read_value(VariableId::Server_NamespaceArray.into())
            .await?;
        let Some(Variant::Array(array)) = result.value else {
            session_error!(self, "Server namespace array is not an array");
            return Err(StatusCode::BadUnexpectedError);
        };
        let namespaces = array
            .values
            .iter()
            .map(|v| match v {
                Variant::String(s) => s.as_ref().to_string(),
                _ => String::new(),
            })
            .collect::<Vec<_>>();
        let map = NamespaceMap::new_from_namespace_array(&namespaces);
        self.encoding_context.write().namespaces_mut().clone_from(&map);
        Ok(())
    }

    /// Disconnect from the server, closing the session and deleting its subscriptions,
    /// then the secure channel. The event loop terminates.
    pub async fn disconnect(&self) -> Result<(), StatusCode> {
        self.disconnect_inner(true, true).await
    }

    /// Disconnect from the server, leaving the session and its subscriptions alive on
    /// the server so they can be reclaimed later.
    pub async fn disconnect_without_delete_subscriptions(&self) -> Result<(), StatusCode> {
        self.disconnect_inner(false, false).await
    }

    pub(crate) async fn disconnect_inner(
        &self,
        delete_subscriptions: bool,
        close_session: bool,
    ) -> Result<(), StatusCode> {
        self.should_reconnect.store(false, Ordering::Relaxed);
        if close_session {
            if let Err(e) = self.close_session(delete_subscriptions).await {
                error!("Failed to close session: {e}");
            }
        }
        self.channel.close_channel().await;
        Ok(())
    }
}

/// Type-state builder for a session and session event loop.
///
/// Typically you will call [`SessionBuilder::with_endpoints`] with the endpoints
/// fetched by [`super::Client::get_server_endpoints`], then one of the `connect_to`
/// methods, then [`SessionBuilder::build`].
pub struct SessionBuilder<'a, T = ()> {
    endpoint: T,
    config: &'a ClientConfig,
    endpoints: Vec<EndpointDescription>,
    session_id: Option<NodeId>,
    user_identity_token: IdentityToken,
    connector: Box<dyn Connector>,
    type_loaders: Vec<Arc<dyn TypeLoader>>,
}

impl<'a> SessionBuilder<'a, ()> {
    /// Create a new session builder with a list of the server's endpoints.
    pub fn new(config: &'a ClientConfig, endpoints: Vec<EndpointDescription>) -> Self {
        Self {
            endpoint: (),
            config,
            endpoints,
            session_id: None,
            user_identity_token: IdentityToken::Anonymous,
            connector: Box::new(crate::transport::TcpConnector),
            type_loaders: Vec::new(),
        }
    }

    /// Connect to the endpoint matching the given description. The server's
    /// certificate and token policies are taken from the matching advertised endpoint.
    pub fn connect_to_matching_endpoint(
        self,
        endpoint: impl Into<EndpointDescription>,
    ) -> Result<SessionBuilder<'a, EndpointDescription>, StatusCode> {
        let endpoint = endpoint.into();
        let security_policy = SecurityPolicy::from_str(endpoint.security_policy_uri.as_ref())
            .map_err(|_| StatusCode::BadSecurityPolicyRejected)?;
        let Some(endpoint) = super::Client::find_matching_endpoint(
            &self.endpoints,
            endpoint.endpoint_url.as_ref(),
            security_policy,
            endpoint.security_mode,
        ) else {
            error!(
                "Cannot find matching endpoint for {}",
                endpoint.endpoint_url.as_ref()
            );
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        };
        Ok(self.with_endpoint(endpoint))
    }

    /// Connect to the strongest endpoint the server offers that supports the configured
    /// identity token, or any unencrypted endpoint when `secure` is false.
    pub fn connect_to_best_endpoint(
        self,
        secure: bool,
    ) -> Result<SessionBuilder<'a, EndpointDescription>, StatusCode> {
        let endpoint = if secure {
            self.endpoints
                .iter()
                .filter(|e| self.endpoint_supports_token(e))
                .max_by_key(|e| e.security_level)
        } else {
            self.endpoints.iter().find(|e| {
                e.security_mode == uastack_types::MessageSecurityMode::None
                    && self.endpoint_supports_token(e)
            })
        };
        let Some(endpoint) = endpoint.cloned() else {
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        };
        Ok(self.with_endpoint(endpoint))
    }

    /// Connect directly to an endpoint description without consulting the server's
    /// advertised endpoints.
    pub fn connect_to_endpoint_directly(
        self,
        endpoint: impl Into<EndpointDescription>,
    ) -> Result<SessionBuilder<'a, EndpointDescription>, StatusCode> {
        let endpoint = endpoint.into();
        if !is_opc_ua_binary_url(endpoint.endpoint_url.as_ref()) {
            error!(
                "Endpoint url {} is not a valid opc.tcp url",
                endpoint.endpoint_url
            );
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        }
        Ok(self.with_endpoint(endpoint))
    }

    fn endpoint_supports_token(&self, endpoint: &EndpointDescription) -> bool {
        use uastack_types::UserTokenType;
        let token_type = match &self.user_identity_token {
            IdentityToken::Anonymous => UserTokenType::Anonymous,
            IdentityToken::UserName(_, _) => UserTokenType::UserName,
            IdentityToken::X509(_, _) => UserTokenType::Certificate,
            IdentityToken::Issued(_) => UserTokenType::IssuedToken,
        };
        // An endpoint with no token policies at all is assumed anonymous.
        match token_type {
            UserTokenType::Anonymous if endpoint.user_identity_tokens.is_none() => true,
            t => endpoint.find_policy(t).is_some(),
        }
    }

    fn with_endpoint(self, endpoint: EndpointDescription) -> SessionBuilder<'a, EndpointDescription> {
        SessionBuilder {
            endpoint,
            config: self.config,
            endpoints: self.endpoints,
            session_id: self.session_id,
            user_identity_token: self.user_identity_token,
            connector: self.connector,
            type_loaders: self.type_loaders,
        }
    }
}

impl<'a, T> SessionBuilder<'a, T> {
    /// Set the user identity token to activate with.
    pub fn user_identity_token(mut self, identity_token: IdentityToken) -> Self {
        self.user_identity_token = identity_token;
        self
    }

    /// Set an initial session id. The session will try to reactivate this session
    /// before creating a new one, which preserves its subscriptions.
    pub fn session_id(mut self, session_id: NodeId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Substitute the connector, e.g. for tests.
    pub fn connector(mut self, connector: Box<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Add a type loader for custom structures.
    pub fn type_loader(mut self, type_loader: Arc<dyn TypeLoader>) -> Self {
        self.type_loaders.push(type_loader);
        self
    }
}

impl SessionBuilder<'_, EndpointDescription> {
    /// Build the session and its event loop. Poll the event loop for a connection to
    /// actually be established.
    pub fn build(self, certificate_store: Arc<RwLock<CertificateStore>>) -> (Arc<Session>, SessionEventLoop) {
        Session::new(
            certificate_store,
            SessionInfo {
                endpoint: self.endpoint,
                user_identity_token: self.user_identity_token,
                preferred_locales: self.config.preferred_locales.clone(),
            },
            self.config.session_name.clone().into(),
            self.config.application_description(),
            self.config.session_retry_policy(),
            self.config.decoding_options(),
            self.config,
            self.session_id,
            self.connector,
            self.type_loaders,
        )
    }
}
