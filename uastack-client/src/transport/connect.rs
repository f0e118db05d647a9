//! Traits abstracting the underlying connection, so the channel logic is independent of
//! the concrete transport.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use uastack_core::comms::secure_channel::SecureChannel;
use uastack_types::StatusCode;

use super::{
    core::{OutgoingMessage, TransportPollResult},
    tcp::{TcpTransport, TransportConfiguration},
};

/// A transport that has been connected and is ready to be polled.
pub trait Transport: Send + Sync + 'static {
    /// Poll the transport, sending and receiving frames. Cancel safe.
    fn poll(&mut self) -> impl Future<Output = TransportPollResult> + Send;
}

/// Establishes a transport to an endpoint. The default connector is
/// [`super::TcpConnector`]; tests substitute their own.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connect to the endpoint and perform the transport handshake, returning a
    /// transport that is ready for the secure channel handshake.
    async fn connect(
        &self,
        channel: Arc<RwLock<SecureChannel>>,
        outgoing_recv: tokio::sync::mpsc::Receiver<OutgoingMessage>,
        config: TransportConfiguration,
        endpoint_url: &str,
    ) -> Result<TcpTransport, StatusCode>;
}
