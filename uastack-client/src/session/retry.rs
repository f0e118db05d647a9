//! Per-request retry policies, used with [`Session::send_with_retry`].

use std::time::Duration;

use futures::FutureExt;
use uastack_types::StatusCode;

use crate::retry::ExponentialBackoff;

use super::{session_debug, Session, UARequest};

/// Trait for generic retry policies, used with [`Session::send_with_retry`].
/// For simple use cases you can use [`DefaultRetryPolicy`].
pub trait RequestRetryPolicy {
    /// Return the time until the next retry, or [`None`] if no more retries should be
    /// attempted.
    fn get_next_delay(&mut self, status: StatusCode) -> Option<Duration>;
}

impl RequestRetryPolicy for Box<dyn RequestRetryPolicy + Send> {
    fn get_next_delay(&mut self, status: StatusCode) -> Option<Duration> {
        (**self).get_next_delay(status)
    }
}

/// A simple default retry policy. This will retry using the given
/// [`ExponentialBackoff`] if the error is one of a set of status codes that are
/// generally transient: connection loss, timeouts, the server being out of resources,
/// or the session being in flux during a reconnect.
#[derive(Clone)]
pub struct DefaultRetryPolicy<'a> {
    backoff: ExponentialBackoff,
    extra_status_codes: &'a [StatusCode],
}

impl<'a> DefaultRetryPolicy<'a> {
    /// Create a new default retry policy with the given backoff generator.
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            backoff,
            extra_status_codes: &[],
        }
    }

    /// Create a retry policy with extra status codes to retry.
    pub fn new_with_extras(
        backoff: ExponentialBackoff,
        extra_status_codes: &'a [StatusCode],
    ) -> Self {
        Self {
            backoff,
            extra_status_codes,
        }
    }
}

impl RequestRetryPolicy for DefaultRetryPolicy<'_> {
    fn get_next_delay(&mut self, status: StatusCode) -> Option<Duration> {
        // These status codes should generally be safe to retry, by default.
        // If users disagree they can simply implement `RequestRetryPolicy` themselves.
        let should_retry = matches!(
            status,
            StatusCode::BadUnexpectedError
                | StatusCode::BadInternalError
                | StatusCode::BadOutOfMemory
                | StatusCode::BadResourceUnavailable
                | StatusCode::BadCommunicationError
                | StatusCode::BadTimeout
                | StatusCode::BadShutdown
                | StatusCode::BadServerNotConnected
                | StatusCode::BadServerHalted
                | StatusCode::BadNonceInvalid
                | StatusCode::BadSessionClosed
                | StatusCode::BadSessionIdInvalid
                | StatusCode::BadSessionNotActivated
                | StatusCode::BadNoCommunication
                | StatusCode::BadTooManySessions
                | StatusCode::BadTcpServerTooBusy
                | StatusCode::BadTcpSecureChannelUnknown
                | StatusCode::BadTcpNotEnoughResources
                | StatusCode::BadTcpInternalError
                | StatusCode::BadSecureChannelClosed
                | StatusCode::BadSecureChannelIdInvalid
                | StatusCode::BadNotConnected
                | StatusCode::BadDeviceFailure
                | StatusCode::BadSensorFailure
                | StatusCode::BadDisconnect
                | StatusCode::BadConnectionClosed
                | StatusCode::BadEndOfStream
                | StatusCode::BadInvalidState
                | StatusCode::BadMaxConnectionsReached
                | StatusCode::BadConnectionRejected
        ) || self.extra_status_codes.contains(&status);

        if should_retry {
            self.backoff.next()
        } else {
            None
        }
    }
}

impl Session {
    /// Send a [`UARequest`], retrying if the request fails with a transient error.
    /// Note that this will always clone the request at least once.
    pub async fn send_with_retry<T: UARequest + Clone>(
        &self,
        request: T,
        mut policy: impl RequestRetryPolicy,
    ) -> Result<T::Out, StatusCode> {
        loop {
            let next_request = request.clone();
            match next_request.send(&self.channel).boxed().await {
                Ok(r) => break Ok(r),
                Err(e) => {
                    if let Some(delay) = policy.get_next_delay(e) {
                        session_debug!(self, "Request failed with {e}, retrying after {delay:?}");
                        tokio::time::sleep(delay).await;
                    } else {
                        break Err(e);
                    }
                }
            }
        }
    }
}
