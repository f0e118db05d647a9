//! Secure channel client state: request handles, request futures, and the
//! OpenSecureChannel issue/renew flow.

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;
use log::{debug, error};
use parking_lot::RwLock;

use uastack_core::{
    comms::secure_channel::SecureChannel, trace_read_lock, trace_write_lock, RequestMessage,
    ResponseMessage,
};
use uastack_crypto::SecurityPolicy;
use uastack_types::{
    DateTime, IntegerId, NodeId, OpenSecureChannelRequest, RequestHeader, SecurityTokenRequestType,
    StatusCode,
};

use super::core::OutgoingMessage;

/// Sender side of the transport's outgoing queue.
pub(crate) type RequestSend = tokio::sync::mpsc::Sender<OutgoingMessage>;

/// Ratio of the local request timer to the timeout hint sent to the server. The local
/// timer fires a little later so the server gets the chance to answer with its own
/// BadTimeout first.
const LOCAL_TIMEOUT_RATIO: f64 = 1.25;

/// A request submitted on a secure channel, resolved by the response with the matching
/// request id. Dropping the returned future abandons the request; the response is
/// discarded when it arrives.
pub(crate) struct Request<T> {
    payload: T,
    sender: RequestSend,
    timeout: Duration,
}

impl<T: Into<RequestMessage>> Request<T> {
    pub(crate) fn new(payload: T, sender: RequestSend, timeout: Duration) -> Self {
        Self {
            payload,
            sender,
            timeout,
        }
    }

    /// Send the request and wait for the response.
    pub(crate) async fn send(self) -> Result<ResponseMessage, StatusCode> {
        let (callback, receiver) = tokio::sync::oneshot::channel();
        let deadline = Instant::now() + self.timeout.mul_f64(LOCAL_TIMEOUT_RATIO);
        let message = OutgoingMessage {
            request: self.payload.into(),
            callback: Some(callback),
            deadline,
        };
        if self.sender.send(message).await.is_err() {
            return Err(StatusCode::BadConnectionClosed);
        }
        match receiver.await {
            Ok(result) => result,
            // The transport dropped the callback without resolving it, it must have died.
            Err(_) => Err(StatusCode::BadConnectionClosed),
        }
    }

    /// Send the request without waiting for a response.
    pub(crate) async fn send_no_response(self) -> Result<(), StatusCode> {
        let deadline = Instant::now() + self.timeout.mul_f64(LOCAL_TIMEOUT_RATIO);
        let message = OutgoingMessage {
            request: self.payload.into(),
            callback: None,
            deadline,
        };
        self.sender
            .send(message)
            .await
            .map_err(|_| StatusCode::BadConnectionClosed)
    }
}

/// Client side state of the secure channel: the request handle counter, the session
/// authentication token, and the issue/renew handshake.
pub(crate) struct SecureChannelState {
    /// Ignore clock skew between the client and the server.
    ignore_clock_skew: bool,
    /// The secure channel this state operates on.
    secure_channel: Arc<RwLock<SecureChannel>>,
    /// The authentication token of the active session, if any. Stamped into every
    /// request header.
    auth_token: Arc<ArcSwap<NodeId>>,
    /// Request handle counter, unique per channel.
    request_handle: AtomicU32,
}

impl SecureChannelState {
    const FIRST_REQUEST_HANDLE: u32 = 1;

    pub(crate) fn new(
        ignore_clock_skew: bool,
        secure_channel: Arc<RwLock<SecureChannel>>,
        auth_token: Arc<ArcSwap<NodeId>>,
    ) -> Self {
        Self {
            ignore_clock_skew,
            secure_channel,
            auth_token,
            request_handle: AtomicU32::new(Self::FIRST_REQUEST_HANDLE),
        }
    }

    /// The next request handle on this channel.
    pub(crate) fn request_handle(&self) -> IntegerId {
        let handle = self.request_handle.fetch_add(1, Ordering::Relaxed);
        if handle == 0 {
            // Zero is not a legal request handle, skip it on wrap.
            self.request_handle.fetch_add(1, Ordering::Relaxed)
        } else {
            handle
        }
    }

    /// Construct a request header with the session's authentication token and the
    /// given timeout as its hint.
    pub(crate) fn make_request_header(&self, timeout: Duration) -> RequestHeader {
        RequestHeader {
            authentication_token: (**self.auth_token.load()).clone(),
            timestamp: DateTime::now(),
            request_handle: self.request_handle(),
            timeout_hint: timeout.as_millis() as u32,
            ..Default::default()
        }
    }

    /// Build the issue or renew OpenSecureChannel request for this channel. A fresh
    /// nonce is generated for each exchange.
    pub(crate) fn begin_issue_or_renew_secure_channel(
        &self,
        request_type: SecurityTokenRequestType,
        channel_lifetime: u32,
        timeout: Duration,
        sender: RequestSend,
    ) -> Request<OpenSecureChannelRequest> {
        let request = {
            let mut secure_channel = trace_write_lock!(self.secure_channel);
            secure_channel.create_random_nonce();

            debug!(
                "Making {:?} secure channel request, policy {}",
                request_type,
                secure_channel.security_policy()
            );

            OpenSecureChannelRequest {
                request_header: self.make_request_header(timeout),
                client_protocol_version: uastack_core::constants::PROTOCOL_VERSION,
                request_type,
                security_mode: secure_channel.security_mode(),
                client_nonce: secure_channel.local_nonce_as_byte_string(),
                requested_lifetime: channel_lifetime,
            }
        };

        Request::new(request, sender, timeout)
    }

    /// Process an OpenSecureChannel response: adopt the new token, derive the new keys
    /// and compute the clock offset when configured to.
    pub(crate) fn end_issue_or_renew_secure_channel(
        &self,
        response: ResponseMessage,
    ) -> Result<(), StatusCode> {
        let ResponseMessage::OpenSecureChannel(response) = response else {
            error!("Expected an OpenSecureChannelResponse, got something else");
            return Err(StatusCode::BadUnknownResponse);
        };

        let mut secure_channel = trace_write_lock!(self.secure_channel);

        if self.ignore_clock_skew && !response.response_header.timestamp.is_null() {
            let offset = response.response_header.timestamp - DateTime::now();
            // The offset is applied cumulatively to every decoded timestamp.
            secure_channel.set_client_offset(offset);
        }

        debug!(
            "Channel {}: token {} issued, lifetime {} ms",
            response.security_token.channel_id,
            response.security_token.token_id,
            response.security_token.revised_lifetime,
        );

        secure_channel.set_security_token(response.security_token.clone());

        if secure_channel.security_policy() != SecurityPolicy::None {
            secure_channel.set_remote_nonce_from_byte_string(&response.server_nonce)?;
            secure_channel.derive_keys();
        }

        Ok(())
    }

    /// Whether the token is due for renewal.
    pub(crate) fn should_renew_security_token(&self) -> bool {
        let secure_channel = trace_read_lock!(self.secure_channel);
        secure_channel.should_renew_security_token()
    }
}
