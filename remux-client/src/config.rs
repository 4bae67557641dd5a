//! Per-connection configuration.
//!
//! One immutable [`ConnectionOptions`] value is shared by every connection a
//! client starts; it is passed once into each supervisor at construction.

use crate::handler::{IncomingHandler, OutgoingHandler};
use crate::message::ConnectionId;
use crate::transport::TransportError;
use std::sync::Arc;
use std::time::Duration;

/// Invoked after every successful connect, before the connection registers.
pub type ConnectHook = Arc<dyn Fn() + Send + Sync>;
/// Invoked for every transport error (connect, read or write failure).
pub type ErrorHook = Arc<dyn Fn(&TransportError) + Send + Sync>;
/// Invoked once a connection's send capability is registered.
pub type StartupHook = Arc<dyn Fn(ConnectionId, Arc<dyn OutgoingHandler>) + Send + Sync>;
/// Invoked when the peer shuts a connection down cleanly.
pub type ShutdownHook = Arc<dyn Fn(ConnectionId) + Send + Sync>;

/// Default backlog capacity per channel.
pub const DEFAULT_OUTGOING_LIMIT: usize = 1000;
/// Default minimum spacing between connect attempts.
pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Immutable configuration bundle for managed connections.
#[derive(Clone)]
pub struct ConnectionOptions {
    /// Minimum spacing between consecutive connect attempts.
    pub reconnect_timeout: Duration,
    /// Backlog capacity: undeliverable messages buffered per channel before
    /// newly submitted ones are dropped.
    pub outgoing_limit: usize,
    pub connect_hook: Option<ConnectHook>,
    pub error_hook: Option<ErrorHook>,
    pub startup_hook: Option<StartupHook>,
    pub shutdown_hook: Option<ShutdownHook>,
    /// Replaces the default route-to-source inbound delivery when present.
    pub incoming_override: Option<Arc<dyn IncomingHandler>>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
            outgoing_limit: DEFAULT_OUTGOING_LIMIT,
            connect_hook: None,
            error_hook: None,
            startup_hook: None,
            shutdown_hook: None,
            incoming_override: None,
        }
    }
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reconnect_timeout(mut self, reconnect_timeout: Duration) -> Self {
        self.reconnect_timeout = reconnect_timeout;
        self
    }

    pub fn with_outgoing_limit(mut self, outgoing_limit: usize) -> Self {
        self.outgoing_limit = outgoing_limit;
        self
    }

    pub fn with_connect_hook(mut self, hook: ConnectHook) -> Self {
        self.connect_hook = Some(hook);
        self
    }

    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.error_hook = Some(hook);
        self
    }

    pub fn with_startup_hook(mut self, hook: StartupHook) -> Self {
        self.startup_hook = Some(hook);
        self
    }

    pub fn with_shutdown_hook(mut self, hook: ShutdownHook) -> Self {
        self.shutdown_hook = Some(hook);
        self
    }

    pub fn with_incoming_override(mut self, incoming: Arc<dyn IncomingHandler>) -> Self {
        self.incoming_override = Some(incoming);
        self
    }
}
