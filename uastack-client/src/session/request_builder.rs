//! The [`UARequest`] trait and the shared request-header builder plumbing used by the
//! typed service request builders.

use std::future::Future;
use std::time::Duration;

use uastack_types::{RequestHeader, StatusCode};

use crate::AsyncSecureChannel;

use super::Session;

/// A typed service request that can be sent on a secure channel, resolving to its typed
/// response.
pub trait UARequest {
    /// The response type of this request.
    type Out;

    /// Send the request on the given channel, waiting for the response.
    fn send<'a>(
        self,
        channel: &'a AsyncSecureChannel,
    ) -> impl Future<Output = Result<Self::Out, StatusCode>> + Send + 'a
    where
        Self: 'a;
}

/// The header state shared by every request builder.
#[derive(Debug, Clone)]
pub(crate) struct RequestHeaderBuilder {
    pub(crate) header: RequestHeader,
    pub(crate) timeout: Duration,
}

impl RequestHeaderBuilder {
    /// Create a header builder from the session's auth token and configured timeout.
    pub(crate) fn new_from_session(session: &Session) -> Self {
        Self {
            header: session.make_request_header(),
            timeout: session.request_timeout(),
        }
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        self.header.timeout_hint = timeout.as_millis() as u32;
    }
}

/// Implements the common builder methods operating on the request header.
macro_rules! builder_base {
    ($name:ident $(< $( $lt:lifetime ),+ >)?) => {
        impl $(< $( $lt ),+ >)? $name $(< $( $lt ),+ >)? {
            /// Set the timeout of the request, including the hint sent to the server.
            #[allow(unused)]
            pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
                self.header.set_timeout(timeout);
                self
            }

            /// Set the full request header, overwriting the timeout and auth token.
            #[allow(unused)]
            pub fn header(mut self, header: uastack_types::RequestHeader) -> Self {
                self.header.header = header;
                self
            }
        }
    };
}

pub(crate) use builder_base;

macro_rules! builder_error {
    ($slf:expr, $($arg:tt)*) => {
        log::error!($($arg)*)
    };
}

pub(crate) use builder_error;
