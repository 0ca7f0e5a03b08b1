//! Client construction and teardown traits

use async_trait::async_trait;

use super::error::{CloseError, ConnectResult};
use crate::client::ConnectionConfig;

/// A live client the cache can own and eventually close.
///
/// Implementations must tolerate concurrent use: one handle is shared by
/// every request for the same connection.
#[async_trait]
pub trait ManagedClient: Send + Sync + 'static {
    /// Release network resources held by this client
    async fn close(&self) -> Result<(), CloseError>;
}

/// Builds one ready-to-use client from a connection configuration.
///
/// `build` should return only after the target confirmed reachability.
/// The cache applies its own connect ceiling on top of whatever the
/// implementation enforces.
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    type Client: ManagedClient;

    async fn build(&self, config: &ConnectionConfig) -> ConnectResult<Self::Client>;
}
