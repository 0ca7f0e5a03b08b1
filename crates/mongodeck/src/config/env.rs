//! Environment variable loading for configuration

use std::env;
use std::net::IpAddr;
use std::time::Duration;

use super::builder::ConfigBuilder;
use crate::Result;

/// Environment variable names
mod vars {
    pub const HOST: &str = "MONGODECK_HOST";
    pub const PORT: &str = "MONGODECK_PORT";
    pub const CORS_ORIGIN: &str = "MONGODECK_CORS_ORIGIN";
    pub const REQUEST_TIMEOUT_SECS: &str = "MONGODECK_REQUEST_TIMEOUT_SECS";
    pub const JWT_SECRET: &str = "MONGODECK_JWT_SECRET";
    pub const JWT_ISSUER: &str = "MONGODECK_JWT_ISSUER";
    pub const AUTH_TOKENS: &str = "MONGODECK_AUTH_TOKENS";
    pub const IDLE_TIMEOUT_SECS: &str = "MONGODECK_IDLE_TIMEOUT_SECS";
    pub const SWEEP_INTERVAL_SECS: &str = "MONGODECK_SWEEP_INTERVAL_SECS";
    pub const CONNECT_TIMEOUT_SECS: &str = "MONGODECK_CONNECT_TIMEOUT_SECS";
    pub const CLOSE_TIMEOUT_SECS: &str = "MONGODECK_CLOSE_TIMEOUT_SECS";
    pub const DEFAULT_PAGE_SIZE: &str = "MONGODECK_DEFAULT_PAGE_SIZE";
    pub const MAX_PAGE_SIZE: &str = "MONGODECK_MAX_PAGE_SIZE";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const JSON_LOGS: &str = "MONGODECK_JSON_LOGS";
}

/// Load configuration from environment variables
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    // Listener
    if let Ok(host_str) = env::var(vars::HOST)
        && let Ok(host) = host_str.parse::<IpAddr>()
    {
        builder = builder.host(host);
    }

    if let Ok(port_str) = env::var(vars::PORT)
        && let Ok(port) = port_str.parse::<u16>()
    {
        builder = builder.port(port);
    }

    if let Ok(origin) = env::var(vars::CORS_ORIGIN) {
        builder = builder.cors_origin(Some(origin).filter(|o| !o.is_empty()));
    }

    if let Some(timeout) = secs_var(vars::REQUEST_TIMEOUT_SECS) {
        builder = builder.request_timeout(timeout);
    }

    // Authentication
    if let Ok(secret) = env::var(vars::JWT_SECRET) {
        builder = builder.jwt_secret(Some(secret));
    }

    if let Ok(issuer) = env::var(vars::JWT_ISSUER) {
        builder = builder.jwt_issuer(Some(issuer));
    }

    if let Ok(tokens) = env::var(vars::AUTH_TOKENS) {
        builder = builder.tokens(parse_token_pairs(&tokens)?);
    }

    // Connection cache
    if let Some(timeout) = secs_var(vars::IDLE_TIMEOUT_SECS) {
        builder = builder.idle_timeout(timeout);
    }

    if let Some(interval) = secs_var(vars::SWEEP_INTERVAL_SECS) {
        builder = builder.sweep_interval(interval);
    }

    if let Some(timeout) = secs_var(vars::CONNECT_TIMEOUT_SECS) {
        builder = builder.connect_timeout(timeout);
    }

    if let Some(timeout) = secs_var(vars::CLOSE_TIMEOUT_SECS) {
        builder = builder.close_timeout(timeout);
    }

    // Paging
    if let Ok(size_str) = env::var(vars::DEFAULT_PAGE_SIZE)
        && let Ok(size) = size_str.parse::<u32>()
    {
        builder = builder.default_page_size(size);
    }

    if let Ok(size_str) = env::var(vars::MAX_PAGE_SIZE)
        && let Ok(size) = size_str.parse::<u32>()
    {
        builder = builder.max_page_size(size);
    }

    // Observability
    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn secs_var(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Parse `token=caller,token2=caller2`
fn parse_token_pairs(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((token, caller)) if !token.trim().is_empty() && !caller.trim().is_empty() => {
                Ok((token.trim().to_string(), caller.trim().to_string()))
            }
            _ => Err(crate::Error::Config(format!(
                "Invalid {}: expected token=caller pairs",
                vars::AUTH_TOKENS
            ))),
        })
        .collect()
}
