//! Connection address synthesis

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use super::ConnectionConfig;
use crate::cache::{ConnectError, ConnectResult};

/// Characters escaped in credentials. Everything except unreserved marks.
const CREDENTIAL: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Resolve the driver address for `config`.
///
/// A non-empty `uri` is returned verbatim. Otherwise the address is
/// `mongodb://[user:pass@]host:port[/database]`, with credentials included
/// only when both username and password are set.
pub fn build_address(config: &ConnectionConfig) -> ConnectResult<String> {
    if let Some(uri) = config.literal_uri() {
        return Ok(uri.to_owned());
    }

    let host = config
        .host
        .as_deref()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ConnectError::InvalidTarget("hostname is required".into()))?;
    let port = config
        .port
        .ok_or_else(|| ConnectError::InvalidTarget("port is required".into()))?;

    let auth = match (config.username.as_deref(), config.password.as_deref()) {
        (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => format!(
            "{}:{}@",
            utf8_percent_encode(user, CREDENTIAL),
            utf8_percent_encode(pass, CREDENTIAL)
        ),
        _ => String::new(),
    };

    let database = config
        .database
        .as_deref()
        .filter(|db| !db.is_empty())
        .map(|db| format!("/{db}"))
        .unwrap_or_default();

    Ok(format!("mongodb://{auth}{host}:{port}{database}"))
}
