//! Bearer authentication middleware

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use super::claims::CallerId;
use super::config::{AuthConfig, AuthMode};
use super::error::{AuthError, Result};
use super::jwt::JwtValidator;

/// Authentication state for middleware
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AuthConfig>,
    pub jwt_validator: Option<Arc<JwtValidator>>,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("has_jwt_validator", &self.jwt_validator.is_some())
            .finish()
    }
}

impl AuthState {
    /// Build state for `config`, constructing the JWT validator when needed
    pub fn new(config: AuthConfig) -> Result<Self> {
        let jwt_validator = match config.jwt_config() {
            Some(jwt) => Some(Arc::new(JwtValidator::new(jwt.clone())?)),
            None => None,
        };
        Ok(Self {
            config: Arc::new(config),
            jwt_validator,
        })
    }

    /// Resolve the caller behind a raw `Authorization` header value
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<CallerId> {
        let header = authorization.ok_or(AuthError::NotAuthenticated)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MalformedHeader)?;

        match &self.config.mode {
            AuthMode::StaticTokens(tokens) => tokens
                .get(token)
                .map(|caller| CallerId(caller.clone()))
                .ok_or(AuthError::InvalidToken),
            AuthMode::Jwt(_) => {
                let validator = self
                    .jwt_validator
                    .as_ref()
                    .ok_or_else(|| AuthError::Config("JWT validator not configured".into()))?;
                validator.validate(token).map(|claims| CallerId(claims.sub))
            }
        }
    }
}

/// Reject unauthenticated requests and attach [`CallerId`] to the rest
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, crate::Error> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let caller = state.authenticate(authorization).map_err(|e| {
        // Token contents stay out of the logs
        tracing::warn!(reason = %e, path = %request.uri().path(), "Authentication failed");
        e
    })?;

    tracing::trace!(caller = %caller, "Caller authenticated");
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;

    fn static_state() -> AuthState {
        AuthState::new(AuthConfig::tokens([("tok-alice", "alice"), ("tok-bob", "bob")])).unwrap()
    }

    #[test]
    fn test_static_token_resolves_caller() {
        let caller = static_state().authenticate(Some("Bearer tok-alice")).unwrap();
        assert_eq!(caller, CallerId("alice".into()));
    }

    #[test]
    fn test_unknown_token() {
        let err = static_state()
            .authenticate(Some("Bearer tok-mallory"))
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            static_state().authenticate(None).unwrap_err(),
            AuthError::NotAuthenticated
        );
    }

    #[test]
    fn test_wrong_scheme() {
        assert_eq!(
            static_state()
                .authenticate(Some("Basic dXNlcjpwYXNz"))
                .unwrap_err(),
            AuthError::MalformedHeader
        );
        assert_eq!(
            static_state().authenticate(Some("Bearer ")).unwrap_err(),
            AuthError::MalformedHeader
        );
    }

    #[test]
    fn test_jwt_state_requires_secret() {
        let err = AuthState::new(AuthConfig::jwt(JwtConfig::new(""))).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_jwt_state_builds_validator() {
        let state = AuthState::new(AuthConfig::jwt(JwtConfig::new("k".repeat(32)))).unwrap();
        assert!(state.jwt_validator.is_some());
        assert_eq!(
            state.authenticate(Some("Bearer garbage")).unwrap_err(),
            AuthError::InvalidToken
        );
    }
}
