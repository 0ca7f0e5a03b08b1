//! TOML configuration file loading

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::builder::ConfigBuilder;
use crate::Result;

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./mongodeck.toml",
    "~/.config/mongodeck/config.toml",
    "/etc/mongodeck/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    if let Some(server) = config.server {
        if let Some(host_str) = server.host {
            let host = host_str.parse::<IpAddr>().map_err(|e| {
                crate::Error::Config(format!("Invalid server.host {host_str:?}: {e}"))
            })?;
            builder = builder.host(host);
        }

        if let Some(port) = server.port {
            builder = builder.port(port);
        }

        if let Some(origin) = server.cors_origin {
            builder = builder.cors_origin(Some(origin));
        }

        if let Some(secs) = server.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
    }

    if let Some(auth) = config.auth {
        if let Some(secret) = auth.jwt_secret {
            builder = builder.jwt_secret(Some(secret));
        }

        if let Some(issuer) = auth.jwt_issuer {
            builder = builder.jwt_issuer(Some(issuer));
        }

        if let Some(tokens) = auth.tokens {
            builder = builder.tokens(tokens.into_iter().collect());
        }
    }

    if let Some(cache) = config.cache {
        if let Some(secs) = cache.idle_timeout_secs {
            builder = builder.idle_timeout(Duration::from_secs(secs));
        }

        if let Some(secs) = cache.sweep_interval_secs {
            builder = builder.sweep_interval(Duration::from_secs(secs));
        }

        if let Some(secs) = cache.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }

        if let Some(secs) = cache.close_timeout_secs {
            builder = builder.close_timeout(Duration::from_secs(secs));
        }
    }

    if let Some(gateway) = config.gateway {
        if let Some(size) = gateway.default_page_size {
            builder = builder.default_page_size(size);
        }

        if let Some(size) = gateway.max_page_size {
            builder = builder.max_page_size(size);
        }
    }

    if let Some(obs) = config.observability {
        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }

        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server: Option<ServerSection>,
    auth: Option<AuthSection>,
    cache: Option<CacheSection>,
    gateway: Option<GatewaySection>,
    observability: Option<ObservabilitySection>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    cors_origin: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AuthSection {
    jwt_secret: Option<String>,
    jwt_issuer: Option<String>,
    /// token -> caller id
    tokens: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct CacheSection {
    idle_timeout_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    close_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GatewaySection {
    default_page_size: Option<u32>,
    max_page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ObservabilitySection {
    log_level: Option<String>,
    json_logs: Option<bool>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[server]
host = "0.0.0.0"
port = 9090
cors_origin = "http://localhost:3000"
request_timeout_secs = 20

[auth]
jwt_issuer = "https://auth.example.com"

[auth.tokens]
dev-token = "alice"

[cache]
idle_timeout_secs = 1800
sweep_interval_secs = 60
connect_timeout_secs = 4
close_timeout_secs = 8

[gateway]
default_page_size = 25
max_page_size = 500

[observability]
log_level = "debug"
json_logs = true
"#;

        let config: FileConfig = toml::from_str(toml_content).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.port, Some(9090));
        assert_eq!(server.request_timeout_secs, Some(20));

        let auth = config.auth.unwrap();
        assert!(auth.jwt_secret.is_none());
        assert_eq!(auth.tokens.unwrap().get("dev-token").unwrap(), "alice");

        assert_eq!(config.cache.unwrap().idle_timeout_secs, Some(1800));
        assert_eq!(config.gateway.unwrap().max_page_size, Some(500));
        assert_eq!(config.observability.unwrap().json_logs, Some(true));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: FileConfig = toml::from_str("[server]\nport = 8081\n").unwrap();
        assert!(config.server.is_some());
        assert!(config.auth.is_none());
        assert!(config.cache.is_none());
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(toml::from_str::<FileConfig>("[connection]\nurl = \"x\"\n").is_err());
    }

    #[test]
    fn test_load_from_file_success() {
        let toml_content = r#"
[server]
host = "192.168.1.1"
port = 8888

[cache]
idle_timeout_secs = 120

[gateway]
default_page_size = 10
"#;
        let temp_file = create_temp_config(toml_content);

        let config = load_from_file(temp_file.path(), ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            config.server.host,
            "192.168.1.1".parse::<IpAddr>().unwrap()
        );
        assert_eq!(config.server.port, 8888);
        assert_eq!(config.cache.idle_timeout, Duration::from_secs(120));
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.gateway.default_limit, 10);
        assert_eq!(config.gateway.max_limit, 1000);
    }

    #[test]
    fn test_load_auth_section() {
        let toml_content = r#"
[auth.tokens]
tok-a = "alice"
tok-b = "bob"
"#;
        let temp_file = create_temp_config(toml_content);

        let config = load_from_file(temp_file.path(), ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();
        assert!(config.auth.accepts_callers());
        assert!(!config.auth.is_jwt_mode());
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(
            Path::new("/nonexistent/path/config.toml"),
            ConfigBuilder::new(),
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let temp_file = create_temp_config("this is not valid toml {{{{");

        let err = load_from_file(temp_file.path(), ConfigBuilder::new()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_invalid_host() {
        let temp_file = create_temp_config("[server]\nhost = \"not_an_ip\"\n");

        let err = load_from_file(temp_file.path(), ConfigBuilder::new()).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("server.host"));
    }

    #[test]
    fn test_file_overrides_builder() {
        let temp_file = create_temp_config("[server]\nport = 9191\n");

        let config = load_from_file(temp_file.path(), ConfigBuilder::new().port(7000))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.server.port, 9191);
    }

    #[test]
    fn test_empty_config_file() {
        let temp_file = create_temp_config("");

        let config = load_from_file(temp_file.path(), ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_find_config_file_not_found() {
        let result = find_config_file();
        assert!(result.is_none() || result.unwrap().exists());
    }
}
