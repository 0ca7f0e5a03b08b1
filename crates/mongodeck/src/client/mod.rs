//! MongoDB client construction

mod address;
mod mongo;

pub use address::build_address;
pub use mongo::{MongoClientFactory, SERVER_SELECTION_TIMEOUT, map_driver_error};

use crate::cache::{ConnectError, ConnectResult};

/// Everything needed to reach one deployment.
///
/// Either a full `uri` or a `host` + `port` pair must be present. When both
/// are given the `uri` wins and the structured fields are ignored.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub uri: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("uri", &self.uri.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionConfig {
    /// Config backed by a literal address string
    #[must_use]
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Config backed by a structured host and port
    #[must_use]
    pub fn from_host(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Literal address, if one is set and non-empty
    #[must_use]
    pub fn literal_uri(&self) -> Option<&str> {
        self.uri.as_deref().filter(|uri| !uri.is_empty())
    }

    /// Check that the config names a reachable target
    pub fn validate(&self) -> ConnectResult<()> {
        if self.literal_uri().is_some() {
            return Ok(());
        }
        match (self.host.as_deref(), self.port) {
            (Some(host), Some(_)) if !host.is_empty() => Ok(()),
            (Some(host), None) if !host.is_empty() => {
                Err(ConnectError::InvalidTarget("port is required with hostname".into()))
            }
            _ => Err(ConnectError::InvalidTarget(
                "either uri or hostname and port must be set".into(),
            )),
        }
    }

    /// Replace secrets in a message before it leaves the process
    #[must_use]
    pub fn scrub(&self, message: &str) -> String {
        let mut scrubbed = message.to_owned();
        for secret in [self.literal_uri(), self.password.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
        {
            scrubbed = scrubbed.replace(secret, "***");
        }
        scrubbed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_uri() {
        assert!(ConnectionConfig::from_uri("mongodb://db:27017").validate().is_ok());
    }

    #[test]
    fn test_validate_host_and_port() {
        assert!(ConnectionConfig::from_host("db", 27017).validate().is_ok());
    }

    #[test]
    fn test_validate_missing_port() {
        let config = ConnectionConfig {
            host: Some("db".into()),
            ..ConnectionConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_validate_empty() {
        assert!(matches!(
            ConnectionConfig::default().validate(),
            Err(ConnectError::InvalidTarget(_))
        ));
        assert!(ConnectionConfig::from_uri("").validate().is_err());
        assert!(ConnectionConfig::from_host("", 27017).validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ConnectionConfig::from_uri("mongodb://u:hunter2@db")
            .with_credentials("admin", "s3cret");
        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("admin"));
        assert!(!debug_str.contains("hunter2"));
        assert!(!debug_str.contains("s3cret"));
    }

    #[test]
    fn test_scrub_removes_password_and_uri() {
        let config = ConnectionConfig::from_host("db", 27017).with_credentials("admin", "s3cret");
        assert_eq!(
            config.scrub("auth failed for admin:s3cret"),
            "auth failed for admin:***"
        );

        let config = ConnectionConfig::from_uri("mongodb://u:p@db:27017");
        assert_eq!(
            config.scrub("cannot parse mongodb://u:p@db:27017"),
            "cannot parse ***"
        );
    }
}
