//! Authentication configuration types

use std::collections::HashMap;
use std::time::Duration;

/// How callers prove their identity
#[derive(Clone)]
pub enum AuthMode {
    /// Fixed bearer tokens, each mapped to a caller id
    StaticTokens(HashMap<String, String>),
    /// HS256-signed JWTs; the `sub` claim is the caller id
    Jwt(Box<JwtConfig>),
}

impl Default for AuthMode {
    fn default() -> Self {
        Self::StaticTokens(HashMap::new())
    }
}

// Token values are credentials; only the caller ids are shown
impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaticTokens(tokens) => {
                let mut callers: Vec<&String> = tokens.values().collect();
                callers.sort();
                f.debug_tuple("StaticTokens").field(&callers).finish()
            }
            Self::Jwt(config) => f.debug_tuple("Jwt").field(config).finish(),
        }
    }
}

/// JWT validation settings
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared HS256 secret
    pub secret: String,
    /// Required `iss` claim, if any
    pub issuer: Option<String>,
    /// Accepted audiences; empty disables the check
    pub audience: Vec<String>,
    /// Clock skew tolerance for exp/nbf validation
    pub clock_skew: Duration,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("clock_skew", &self.clock_skew)
            .finish_non_exhaustive()
    }
}

impl JwtConfig {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
            audience: vec![],
            clock_skew: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub mode: AuthMode,
}

impl AuthConfig {
    #[must_use]
    pub const fn new(mode: AuthMode) -> Self {
        Self { mode }
    }

    /// Static token table
    #[must_use]
    pub fn tokens<I, K, V>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(AuthMode::StaticTokens(
            tokens
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    #[must_use]
    pub fn jwt(config: JwtConfig) -> Self {
        Self::new(AuthMode::Jwt(Box::new(config)))
    }

    /// Whether any caller can authenticate at all
    #[must_use]
    pub fn accepts_callers(&self) -> bool {
        match &self.mode {
            AuthMode::StaticTokens(tokens) => !tokens.is_empty(),
            AuthMode::Jwt(config) => !config.secret.is_empty(),
        }
    }

    #[must_use]
    pub const fn is_jwt_mode(&self) -> bool {
        matches!(self.mode, AuthMode::Jwt(_))
    }

    #[must_use]
    pub fn jwt_config(&self) -> Option<&JwtConfig> {
        match &self.mode {
            AuthMode::Jwt(config) => Some(config),
            AuthMode::StaticTokens(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_accepts_nobody() {
        let config = AuthConfig::default();
        assert!(!config.accepts_callers());
        assert!(!config.is_jwt_mode());
    }

    #[test]
    fn test_static_tokens() {
        let config = AuthConfig::tokens([("tok-1", "alice")]);
        assert!(config.accepts_callers());
        assert!(config.jwt_config().is_none());
    }

    #[test]
    fn test_jwt_mode() {
        let config = AuthConfig::jwt(JwtConfig::new("secret").with_issuer("https://auth.example.com"));
        assert!(config.is_jwt_mode());
        assert!(config.accepts_callers());
        assert_eq!(
            config.jwt_config().unwrap().issuer.as_deref(),
            Some("https://auth.example.com")
        );
    }

    #[test]
    fn test_empty_secret_accepts_nobody() {
        assert!(!AuthConfig::jwt(JwtConfig::new("")).accepts_callers());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AuthConfig::jwt(JwtConfig::new("super-secret-value"));
        assert!(!format!("{config:?}").contains("super-secret-value"));

        let config = AuthConfig::tokens([("tok-abcdef", "alice")]);
        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("tok-abcdef"));
        assert!(debug_str.contains("alice"));
    }
}
