//! Connection establishment for a session: open the secure channel, then reactivate
//! the existing session on it or create a fresh one, then bring the subscriptions over.

use std::sync::Arc;

use log::debug;

use uastack_types::{NodeId, StatusCode};

use crate::transport::SecureChannelEventLoop;

use super::{session_debug, session_warn, Session};

/// How a connect attempt associated the session with the server.
#[derive(Debug, Clone)]
pub enum SessionConnectMode {
    /// The session with the given id was reactivated on the new secure channel; server
    /// state including subscriptions survived.
    ReactivatedSession(NodeId),
    /// A new session was created, either because there was none or because the server
    /// no longer recognized the old one.
    NewSession(NodeId),
}

pub(crate) struct SessionConnector {
    inner: Arc<Session>,
}

impl SessionConnector {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { inner: session }
    }

    pub(crate) async fn try_connect(
        &self,
    ) -> Result<(SecureChannelEventLoop, SessionConnectMode), StatusCode> {
        let channel_event_loop = self.inner.channel.connect().await?;
        let mode = match self.connect_and_activate().await {
            Ok(mode) => mode,
            Err(e) => {
                self.inner.channel.close_channel().await;
                return Err(e);
            }
        };
        Ok((channel_event_loop, mode))
    }

    async fn connect_and_activate(&self) -> Result<SessionConnectMode, StatusCode> {
        let has_session = !self.inner.server_session_id().is_null();

        let mode = if has_session {
            match self.reactivate().await {
                Ok(id) => SessionConnectMode::ReactivatedSession(id),
                Err(e)
                    if matches!(
                        e,
                        StatusCode::BadSessionIdInvalid
                            | StatusCode::BadSessionNotActivated
                            | StatusCode::BadSessionClosed
                    ) =>
                {
                    session_debug!(
                        self.inner,
                        "Session is no longer valid on the server ({e}), creating a new one"
                    );
                    self.create_and_activate().await?
                }
                Err(e) => return Err(e),
            }
        } else {
            self.create_and_activate().await?
        };

        if let SessionConnectMode::NewSession(_) = &mode {
            // The new session owns nothing yet. Try to transfer the subscriptions from
            // whatever session previously owned them; anything the server refuses to
            // transfer is recreated from the client's bookkeeping.
            self.inner.transfer_subscriptions_from_old_session().await;
        }

        if let Err(e) = self.inner.read_namespace_array().await {
            session_warn!(
                self.inner,
                "Failed to read the server namespace array: {e}. Custom namespaces will not resolve"
            );
        }

        self.inner.trigger_publish();
        Ok(mode)
    }

    /// Reactivate the existing session on the new channel, then transfer its
    /// subscriptions to pick up anything the server refused to carry over.
    async fn reactivate(&self) -> Result<NodeId, StatusCode> {
        self.inner.activate_session().await?;
        let session_id = self.inner.server_session_id();
        debug!("Reactivated session {session_id} on the new channel");

        self.inner.transfer_subscriptions_from_old_session().await;
        Ok(session_id)
    }

    async fn create_and_activate(&self) -> Result<SessionConnectMode, StatusCode> {
        // The old authentication token is void with the old session.
        self.inner.auth_token.store(Arc::new(NodeId::null()));
        let session_id = self.inner.create_session().await?;
        self.inner.activate_session().await?;
        Ok(SessionConnectMode::NewSession(session_id))
    }
}
