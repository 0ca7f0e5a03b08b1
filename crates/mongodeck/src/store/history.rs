//! Per-caller query history

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    #[serde(skip)]
    pub owner: String,
    pub query: String,
    pub database: String,
    pub collection: String,
    pub connection_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryEntry {
    pub query: String,
    pub database: String,
    pub collection: String,
    pub connection_id: String,
}

#[async_trait]
pub trait QueryHistoryStore: Send + Sync {
    async fn record(&self, owner: &str, entry: NewHistoryEntry) -> StoreResult<HistoryEntry>;

    /// Entries of `owner`, newest first
    async fn list_for_owner(&self, owner: &str) -> StoreResult<Vec<HistoryEntry>>;

    /// Remove every entry of `owner`, returning how many were dropped
    async fn clear_for_owner(&self, owner: &str) -> StoreResult<usize>;
}

#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl InMemoryHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueryHistoryStore for InMemoryHistoryStore {
    async fn record(&self, owner: &str, entry: NewHistoryEntry) -> StoreResult<HistoryEntry> {
        if entry.query.trim().is_empty() {
            return Err(StoreError::Validation("query is required".into()));
        }
        if entry.connection_id.is_empty() {
            return Err(StoreError::Validation("connectionId is required".into()));
        }

        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_owned(),
            query: entry.query,
            database: entry.database,
            collection: entry.collection,
            connection_id: entry.connection_id,
            created_at: Utc::now(),
        };
        self.entries.write().push(entry.clone());
        Ok(entry)
    }

    async fn list_for_owner(&self, owner: &str) -> StoreResult<Vec<HistoryEntry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .rev()
            .filter(|e| e.owner == owner)
            .cloned()
            .collect())
    }

    async fn clear_for_owner(&self, owner: &str) -> StoreResult<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.owner != owner);
        Ok(before - entries.len())
    }
}
