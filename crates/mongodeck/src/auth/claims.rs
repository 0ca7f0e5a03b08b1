//! Token claims and the resolved caller identity

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Deserialize;

use crate::Error;

/// Audience can be a single string or array of strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// JWT payload fields we read
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<OneOrMany>,
    pub exp: i64,
}

/// Opaque identity of the authenticated caller.
///
/// Inserted into request extensions by the auth middleware. Handlers take it
/// as an extractor; a request without one is rejected with 401.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(pub String);

impl CallerId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| Error::Unauthorized("authentication required".into()))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    #[tokio::test]
    async fn test_extracts_from_extensions() {
        let (mut parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();
        parts.extensions.insert(CallerId("alice".into()));

        let caller = CallerId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(caller.as_str(), "alice");
        assert_eq!(caller.to_string(), "alice");
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let (mut parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();
        let err = CallerId::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_claims_deserialize_audience_forms() {
        let claims: JwtClaims =
            serde_json::from_str(r#"{"sub":"u1","exp":1,"aud":["a","b"]}"#).unwrap();
        assert!(matches!(claims.aud, Some(OneOrMany::Many(ref v)) if v.len() == 2));

        let claims: JwtClaims = serde_json::from_str(r#"{"sub":"u1","exp":1,"aud":"a"}"#).unwrap();
        assert!(matches!(claims.aud, Some(OneOrMany::One(_))));
    }
}
