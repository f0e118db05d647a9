//! An asynchronous OPC UA client: secure channel management, sessions with automatic
//! reconnection, attribute and method services, and subscriptions with a background
//! publish pipeline.
//!
//! The client is driven by event loops. Connecting produces a [`Session`] plus a
//! [`SessionEventLoop`]; nothing happens until the event loop is polled or spawned onto
//! a task. Requests are submitted from any task and resolve when the correlated
//! response arrives.

mod builder;
mod config;
mod retry;
mod session;
mod transport;

pub use builder::ClientBuilder;
pub use config::{ClientConfig, ClientEndpoint, ClientUserToken};
pub use retry::{ExponentialBackoff, SessionRetryPolicy};
pub use session::{
    ActivateSession, Call, Cancel, Client, CloseSession, CreateMonitoredItems, CreateSession,
    CreateSubscription, DataChangeCallback, DefaultRetryPolicy, DeleteMonitoredItems,
    DeleteSubscriptions, EventCallback, ModifyMonitoredItems, ModifySubscription, MonitoredItem,
    OnSubscriptionNotification, Read, RequestRetryPolicy, SessionActivity, SessionConnectMode,
    SessionBuilder, SessionEventLoop, SessionInfo, SessionPollResult, SessionState,
    SetMonitoringMode, SetPublishingMode, SetTriggering, Subscription, SubscriptionActivity,
    SubscriptionCallbacks, TransferSubscriptions, UARequest, Write,
};
pub use session::Session;
pub use transport::{AsyncSecureChannel, Connector, TcpConnector, TransportPollResult};

use std::path::PathBuf;

/// User identity token for activating a session.
#[derive(Debug, Clone)]
pub enum IdentityToken {
    /// An anonymous identity.
    Anonymous,
    /// A user name and password.
    UserName(String, String),
    /// An X.509 certificate and private key, by path. The certificate proves the
    /// user's identity, the key signs the server's nonce as proof of possession.
    X509(PathBuf, PathBuf),
    /// A token issued by an external authority, carried opaquely.
    Issued(Vec<u8>),
}
