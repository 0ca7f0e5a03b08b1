//! JWT parsing and validation

use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use super::claims::JwtClaims;
use super::config::JwtConfig;
use super::error::{AuthError, Result};

/// HS256 JWT validator
pub struct JwtValidator {
    config: JwtConfig,
    key: DecodingKey,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    pub fn new(config: JwtConfig) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(AuthError::Config("JWT secret not configured".into()));
        }
        let key = DecodingKey::from_secret(config.secret.as_bytes());
        Ok(Self { config, key })
    }

    /// Validate `token` and return its claims
    pub fn validate(&self, token: &str) -> Result<JwtClaims> {
        let mut validation = Validation::new(Algorithm::HS256);

        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer.trim_end_matches('/')]);
        }

        if self.config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&self.config.audience);
        }

        validation.leeway = self.config.clock_skew.as_secs();

        let token_data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &validation)?;
        if token_data.claims.sub.is_empty() {
            return Err(AuthError::MissingSubject);
        }

        Ok(token_data.claims)
    }
}
