//! Configuration builder

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::Error;
use crate::auth::{AuthConfig, JwtConfig};
use crate::cache::EvictionPolicy;
use crate::gateway::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageLimits};

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub cache: EvictionPolicy,
    pub gateway: PageLimits,
    pub observability: ObservabilityConfig,
}

impl Config {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    #[must_use]
    pub const fn server(&self) -> &ServerConfig {
        &self.server
    }

    #[must_use]
    pub const fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    #[must_use]
    pub const fn cache(&self) -> &EvictionPolicy {
        &self.cache
    }

    #[must_use]
    pub const fn gateway(&self) -> &PageLimits {
        &self.gateway
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Allowed browser origin; `None` falls back to `http://localhost:3000`
    pub cors_origin: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ConfigBuilder::DEFAULT_SERVER
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug)]
pub struct ConfigBuilder {
    server: ServerConfig,
    jwt_secret: Option<String>,
    jwt_issuer: Option<String>,
    tokens: Vec<(String, String)>,
    cache: EvictionPolicy,
    gateway: PageLimits,
    observability: ObservabilityConfig,
}

impl ConfigBuilder {
    const DEFAULT_SERVER: ServerConfig = ServerConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 8080,
        cors_origin: None,
        request_timeout: Duration::from_secs(30),
    };

    #[must_use]
    pub const fn new() -> Self {
        Self {
            server: Self::DEFAULT_SERVER,
            jwt_secret: None,
            jwt_issuer: None,
            tokens: Vec::new(),
            cache: EvictionPolicy::new(),
            gateway: PageLimits::new(DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE),
            observability: ObservabilityConfig {
                log_level: String::new(),
                json_logs: false,
            },
        }
    }

    #[must_use]
    pub const fn host(mut self, host: IpAddr) -> Self {
        self.server.host = host;
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    #[must_use]
    pub fn cors_origin(mut self, origin: Option<String>) -> Self {
        self.server.cors_origin = origin;
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.server.request_timeout = timeout;
        self
    }

    // Authentication

    /// HS256 secret; when set, JWT mode replaces the static token table
    #[must_use]
    pub fn jwt_secret(mut self, secret: Option<String>) -> Self {
        self.jwt_secret = secret;
        self
    }

    #[must_use]
    pub fn jwt_issuer(mut self, issuer: Option<String>) -> Self {
        self.jwt_issuer = issuer;
        self
    }

    /// Replace the static `token -> caller id` table
    #[must_use]
    pub fn tokens(mut self, tokens: Vec<(String, String)>) -> Self {
        self.tokens = tokens;
        self
    }

    // Connection cache

    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.cache.idle_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn sweep_interval(mut self, interval: Duration) -> Self {
        self.cache.sweep_interval = interval;
        self
    }

    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.cache.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn close_timeout(mut self, timeout: Duration) -> Self {
        self.cache.close_timeout = timeout;
        self
    }

    // Gateway

    #[must_use]
    pub const fn default_page_size(mut self, size: u32) -> Self {
        self.gateway.default_limit = size;
        self
    }

    #[must_use]
    pub const fn max_page_size(mut self, size: u32) -> Self {
        self.gateway.max_limit = size;
        self
    }

    // Observability

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.observability.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.observability.json_logs = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<Config> {
        let durations = [
            ("request_timeout", self.server.request_timeout),
            ("idle_timeout", self.cache.idle_timeout),
            ("sweep_interval", self.cache.sweep_interval),
            ("connect_timeout", self.cache.connect_timeout),
            ("close_timeout", self.cache.close_timeout),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(Error::Config(format!("{name} must be greater than zero")));
        }

        if self.gateway.default_limit == 0 {
            return Err(Error::Config("default_page_size must be at least 1".into()));
        }
        if self.gateway.default_limit > self.gateway.max_limit {
            return Err(Error::Config(format!(
                "default_page_size ({}) exceeds max_page_size ({})",
                self.gateway.default_limit, self.gateway.max_limit
            )));
        }

        // A configured secret switches to JWT mode
        let auth = match self.jwt_secret.filter(|s| !s.is_empty()) {
            Some(secret) => {
                let mut jwt = JwtConfig::new(secret);
                if let Some(issuer) = self.jwt_issuer {
                    jwt = jwt.with_issuer(issuer);
                }
                AuthConfig::jwt(jwt)
            }
            None => AuthConfig::tokens(self.tokens),
        };

        let log_level = if self.observability.log_level.is_empty() {
            "info".to_string()
        } else {
            self.observability.log_level
        };

        Ok(Config {
            server: self.server,
            auth,
            cache: self.cache,
            gateway: self.gateway,
            observability: ObservabilityConfig {
                log_level,
                json_logs: self.observability.json_logs,
            },
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
