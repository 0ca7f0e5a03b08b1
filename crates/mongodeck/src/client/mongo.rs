//! Driver-backed client factory

use std::time::Duration;

use async_trait::async_trait;
use mongodb::Client;
use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;

use super::{ConnectionConfig, build_address};
use crate::cache::{
    ClientFactory, CloseError, ConnectError, ConnectResult, DEFAULT_CONNECT_TIMEOUT, ManagedClient,
};

/// Ceiling on picking a suitable server for each operation
pub const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

const APP_NAME: &str = "mongodeck";

/// Builds [`mongodb::Client`]s and confirms reachability with a `ping`.
#[derive(Debug, Clone)]
pub struct MongoClientFactory {
    connect_timeout: Duration,
    server_selection_timeout: Duration,
}

impl Default for MongoClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MongoClientFactory {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            server_selection_timeout: SERVER_SELECTION_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = timeout;
        self
    }

    async fn options(&self, config: &ConnectionConfig) -> ConnectResult<ClientOptions> {
        let address = build_address(config)?;
        let mut options = ClientOptions::parse(address.as_str())
            .await
            .map_err(|e| map_driver_error(&e, config))?;

        options.connect_timeout = Some(self.connect_timeout);
        options.server_selection_timeout = Some(self.server_selection_timeout);
        if options.app_name.is_none() {
            options.app_name = Some(APP_NAME.to_owned());
        }
        Ok(options)
    }
}

#[async_trait]
impl ClientFactory for MongoClientFactory {
    type Client = Client;

    async fn build(&self, config: &ConnectionConfig) -> ConnectResult<Client> {
        let options = self.options(config).await?;
        let client = Client::with_options(options).map_err(|e| map_driver_error(&e, config))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| map_driver_error(&e, config))?;

        Ok(client)
    }
}

#[async_trait]
impl ManagedClient for Client {
    async fn close(&self) -> Result<(), CloseError> {
        self.clone().shutdown().await;
        Ok(())
    }
}

/// Classify a driver error into the construction taxonomy, scrubbing secrets
pub fn map_driver_error(err: &mongodb::error::Error, config: &ConnectionConfig) -> ConnectError {
    let message = config.scrub(&err.to_string());
    match err.kind.as_ref() {
        ErrorKind::Authentication { .. } => ConnectError::AuthFailure(message),
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) | ErrorKind::DnsResolve { .. } => {
            ConnectError::ConnectionRefused(message)
        }
        ErrorKind::InvalidArgument { .. } => ConnectError::InvalidTarget(message),
        _ => ConnectError::Internal(message),
    }
}
