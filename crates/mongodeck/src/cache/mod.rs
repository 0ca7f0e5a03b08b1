//! Live client cache for saved connections
//!
//! Opening a database client means a TCP handshake, TLS negotiation and
//! authentication, so requests reuse one client per saved connection.
//!
//! # Lifecycle
//!
//! - The first request for a connection id builds a client through the
//!   [`ClientFactory`]. Concurrent requests for the same id wait on that one
//!   attempt and receive the same handle or the same error.
//! - Every successful lookup refreshes the entry's last-access time.
//! - A background sweep, started with the first lookup, closes entries idle
//!   longer than [`EvictionPolicy::idle_timeout`].
//! - Editing or deleting a saved connection calls
//!   [`ConnectionCache::invalidate`] so the next request sees the new
//!   settings.
//!
//! Failed constructions are never cached.

mod connections;
mod error;
mod eviction;
mod factory;
mod policy;

pub use connections::{CacheStats, ClientHandle, ConnectionCache};
pub use error::{CloseError, ConnectError, ConnectResult};
pub use eviction::EvictionTask;
pub use factory::{ClientFactory, ManagedClient};
pub use policy::{
    CONNECT_GRACE, DEFAULT_CLOSE_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_SWEEP_INTERVAL, EvictionPolicy,
};
