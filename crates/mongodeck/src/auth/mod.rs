//! Caller authentication
//!
//! Resolves an opaque caller id from `Authorization: Bearer <token>`, either
//! through a static token table or HS256 JWT validation via `jsonwebtoken`.
//! Everything downstream only sees [`CallerId`].

mod claims;
mod config;
mod error;
mod jwt;
mod middleware;

pub use claims::{CallerId, JwtClaims, OneOrMany};
pub use config::{AuthConfig, AuthMode, JwtConfig};
pub use error::{AuthError, Result};
pub use jwt::JwtValidator;
pub use middleware::{AuthState, auth_middleware};
