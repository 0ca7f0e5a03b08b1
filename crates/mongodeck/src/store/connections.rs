//! Saved connection records

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{StoreError, StoreResult};
use crate::client::ConnectionConfig;

/// A saved connection as stored, secrets included
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub uri: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl ConnectionRecord {
    /// Driver-facing configuration for this record
    #[must_use]
    pub fn to_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            uri: self.uri.clone(),
            host: self.hostname.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }

    /// Public projection without credentials or the raw address
    #[must_use]
    pub fn to_safe(&self) -> SafeConnection {
        SafeConnection {
            id: self.id.clone(),
            name: self.name.clone(),
            hostname: self.hostname.clone(),
            port: self.port,
            database: self.database.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn validate(&self) -> StoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Validation("name is required".into()));
        }
        let has_uri = self.uri.as_deref().is_some_and(|u| !u.is_empty());
        let has_host = self.hostname.as_deref().is_some_and(|h| !h.is_empty());
        if !has_uri && !(has_host && self.port.is_some()) {
            return Err(StoreError::Validation(
                "either uri or hostname and port are required".into(),
            ));
        }
        Ok(())
    }
}

/// What callers see of a saved connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeConnection {
    pub id: String,
    pub name: String,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of a create request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConnection {
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Body of a partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPatch {
    pub name: Option<String>,
    pub uri: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl ConnectionPatch {
    fn apply(self, record: &mut ConnectionRecord) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if self.uri.is_some() {
            record.uri = self.uri;
        }
        if self.hostname.is_some() {
            record.hostname = self.hostname;
        }
        if self.port.is_some() {
            record.port = self.port;
        }
        if self.username.is_some() {
            record.username = self.username;
        }
        if self.password.is_some() {
            record.password = self.password;
        }
        if self.database.is_some() {
            record.database = self.database;
        }
    }
}

/// Persistence boundary for saved connections
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn create(&self, owner: &str, new: NewConnection) -> StoreResult<ConnectionRecord>;

    /// All records of `owner`, newest first
    async fn list_for_owner(&self, owner: &str) -> StoreResult<Vec<ConnectionRecord>>;

    async fn get_for_owner(&self, owner: &str, id: &str) -> StoreResult<ConnectionRecord>;

    async fn update_for_owner(
        &self,
        owner: &str,
        id: &str,
        patch: ConnectionPatch,
    ) -> StoreResult<ConnectionRecord>;

    async fn delete_for_owner(&self, owner: &str, id: &str) -> StoreResult<ConnectionRecord>;
}

/// Process-local store; contents are lost on restart
#[derive(Debug, Default)]
pub struct InMemoryConnectionStore {
    records: RwLock<Vec<ConnectionRecord>>,
}

impl InMemoryConnectionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(id: &str) -> StoreError {
        StoreError::NotFound(format!("connection {id}"))
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn create(&self, owner: &str, new: NewConnection) -> StoreResult<ConnectionRecord> {
        let now = Utc::now();
        let record = ConnectionRecord {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_owned(),
            name: new.name,
            uri: new.uri,
            hostname: new.hostname,
            port: new.port,
            username: new.username,
            password: new.password,
            database: new.database,
            created_at: now,
            updated_at: now,
        };
        record.validate()?;

        self.records.write().push(record.clone());
        tracing::debug!(connection.id = %record.id, owner, "Connection saved");
        Ok(record)
    }

    async fn list_for_owner(&self, owner: &str) -> StoreResult<Vec<ConnectionRecord>> {
        Ok(self
            .records
            .read()
            .iter()
            .rev()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect())
    }

    async fn get_for_owner(&self, owner: &str, id: &str) -> StoreResult<ConnectionRecord> {
        self.records
            .read()
            .iter()
            .find(|r| r.id == id && r.owner == owner)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn update_for_owner(
        &self,
        owner: &str,
        id: &str,
        patch: ConnectionPatch,
    ) -> StoreResult<ConnectionRecord> {
        let mut records = self.records.write();
        let record = records
            .iter_mut()
            .find(|r| r.id == id && r.owner == owner)
            .ok_or_else(|| Self::not_found(id))?;

        let mut updated = record.clone();
        patch.apply(&mut updated);
        updated.validate()?;
        updated.updated_at = Utc::now().max(record.updated_at);

        *record = updated.clone();
        Ok(updated)
    }

    async fn delete_for_owner(&self, owner: &str, id: &str) -> StoreResult<ConnectionRecord> {
        let mut records = self.records.write();
        let index = records
            .iter()
            .position(|r| r.id == id && r.owner == owner)
            .ok_or_else(|| Self::not_found(id))?;
        Ok(records.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str) -> NewConnection {
        NewConnection {
            name: name.into(),
            hostname: Some("localhost".into()),
            port: Some(27017),
            ..NewConnection::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryConnectionStore::new();
        let created = store.create("alice", local("dev")).await.unwrap();

        let fetched = store.get_for_owner("alice", &created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.owner, "alice");
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[tokio::test]
    async fn test_foreign_owner_is_not_found() {
        let store = InMemoryConnectionStore::new();
        let created = store.create("alice", local("dev")).await.unwrap();

        let err = store.get_for_owner("bob", &created.id).await.unwrap_err();
        assert!(err.is_not_found());

        let err = store.delete_for_owner("bob", &created.id).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.get_for_owner("alice", &created.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_newest_first_and_scoped() {
        let store = InMemoryConnectionStore::new();
        store.create("alice", local("first")).await.unwrap();
        store.create("bob", local("other")).await.unwrap();
        store.create("alice", local("second")).await.unwrap();

        let names: Vec<String> = store
            .list_for_owner("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_create_requires_target() {
        let store = InMemoryConnectionStore::new();
        let err = store
            .create(
                "alice",
                NewConnection {
                    name: "broken".into(),
                    hostname: Some("localhost".into()),
                    ..NewConnection::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let store = InMemoryConnectionStore::new();
        let err = store.create("alice", local("  ")).await.unwrap_err();
        assert_eq!(err, StoreError::Validation("name is required".into()));
    }

    #[tokio::test]
    async fn test_update_is_partial() {
        let store = InMemoryConnectionStore::new();
        let created = store
            .create(
                "alice",
                NewConnection {
                    username: Some("admin".into()),
                    password: Some("old".into()),
                    ..local("dev")
                },
            )
            .await
            .unwrap();

        let updated = store
            .update_for_owner(
                "alice",
                &created.id,
                ConnectionPatch {
                    password: Some("new".into()),
                    ..ConnectionPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.password.as_deref(), Some("new"));
        assert_eq!(updated.username.as_deref(), Some("admin"));
        assert_eq!(updated.name, "dev");
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_record_untouched() {
        let store = InMemoryConnectionStore::new();
        let created = store.create("alice", local("dev")).await.unwrap();

        let err = store
            .update_for_owner(
                "alice",
                &created.id,
                ConnectionPatch {
                    name: Some(String::new()),
                    ..ConnectionPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let fetched = store.get_for_owner("alice", &created.id).await.unwrap();
        assert_eq!(fetched.name, "dev");
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let store = InMemoryConnectionStore::new();
        let created = store.create("alice", local("dev")).await.unwrap();

        let deleted = store.delete_for_owner("alice", &created.id).await.unwrap();
        assert_eq!(deleted.id, created.id);
        assert!(store.list_for_owner("alice").await.unwrap().is_empty());
    }

    #[test]
    fn test_safe_view_hides_secrets() {
        let now = Utc::now();
        let record = ConnectionRecord {
            id: "c1".into(),
            owner: "alice".into(),
            name: "prod".into(),
            uri: Some("mongodb://u:p@db".into()),
            hostname: Some("db".into()),
            port: Some(27017),
            username: Some("u".into()),
            password: Some("p".into()),
            database: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(record.to_safe()).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("uri").is_none());
        assert!(json.get("username").is_none());
        assert_eq!(json["hostname"], "db");
        assert!(json.get("createdAt").is_some());

        let debug_str = format!("{record:?}");
        assert!(!debug_str.contains("mongodb://u:p@db"));
    }

    #[test]
    fn test_to_config_carries_fields() {
        let now = Utc::now();
        let record = ConnectionRecord {
            id: "c1".into(),
            owner: "alice".into(),
            name: "prod".into(),
            uri: None,
            hostname: Some("db".into()),
            port: Some(27017),
            username: Some("u".into()),
            password: Some("p".into()),
            database: Some("shop".into()),
            created_at: now,
            updated_at: now,
        };
        let config = record.to_config();
        assert_eq!(config.host.as_deref(), Some("db"));
        assert_eq!(config.port, Some(27017));
        assert_eq!(config.database.as_deref(), Some("shop"));
        assert!(config.validate().is_ok());
    }
}
