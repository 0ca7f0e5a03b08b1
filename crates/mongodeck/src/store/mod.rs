//! Durable records owned by callers: saved connections and query history
//!
//! Every lookup is scoped to an owner. A record owned by someone else is
//! reported exactly like a missing one.

mod connections;
mod history;

pub use connections::{
    ConnectionPatch, ConnectionRecord, ConnectionStore, InMemoryConnectionStore, NewConnection,
    SafeConnection,
};
pub use history::{HistoryEntry, InMemoryHistoryStore, NewHistoryEntry, QueryHistoryStore};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),
}

impl StoreError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
