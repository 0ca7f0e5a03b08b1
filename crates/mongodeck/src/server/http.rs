//! Listener, router layers and the public endpoints

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Json};
use mongodb::Client;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::{AppState, router};
use crate::auth::{AuthConfig, AuthState};
use crate::cache::ClientFactory;
use crate::config::ServerConfig;
use crate::{Error, Result};

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    cached_clients: usize,
}

/// Serve the API until `shutdown` resolves.
///
/// Stops accepting connections on shutdown and lets in-flight requests
/// finish; tearing down the cache is left to the caller.
pub async fn run<F>(
    config: &ServerConfig,
    state: AppState<F>,
    auth_config: AuthConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()>
where
    F: ClientFactory<Client = Client>,
{
    let addr = SocketAddr::new(config.host, config.port);

    // Warn about security configuration
    emit_security_warnings(config, &auth_config);

    let auth = AuthState::new(auth_config)?;
    let cors = build_cors_layer(config);

    let app = router(state, auth)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("HTTP server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Internal(format!("HTTP server error: {e}")))?;

    tracing::info!("HTTP server shutdown complete");
    Ok(())
}

fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origin = config
        .cors_origin
        .as_deref()
        .and_then(|o| o.parse::<HeaderValue>().ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CORS_ORIGIN));

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn emit_security_warnings(config: &ServerConfig, auth: &AuthConfig) {
    let host = config.host;
    let is_non_loopback = !host.is_loopback();
    let is_all_interfaces = host == IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        || host == IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED);

    if is_all_interfaces {
        tracing::warn!(
            "HTTP server binding to all interfaces (0.0.0.0). \
             This exposes the server to all network interfaces."
        );
    } else if is_non_loopback {
        tracing::warn!(
            "HTTP server binding to non-loopback address ({host}). \
             Ensure network security policies are in place."
        );
    }

    if !auth.accepts_callers() {
        tracing::warn!(
            "No callers can authenticate. Set MONGODECK_JWT_SECRET or \
             MONGODECK_AUTH_TOKENS; every protected route will answer 401."
        );
    } else if !auth.is_jwt_mode() && is_non_loopback {
        tracing::warn!(
            "SECURITY WARNING: static bearer tokens accepted from the network. \
             Configure MONGODECK_JWT_SECRET for anything beyond local development."
        );
    }

    if config.cors_origin.is_none() {
        tracing::info!(
            "CORS origin not configured (MONGODECK_CORS_ORIGIN). \
             Using restrictive default: {DEFAULT_CORS_ORIGIN}"
        );
    }
}

pub(super) async fn health_handler<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cached_clients: state.cache.len(),
    })
}

#[cfg(feature = "metrics")]
pub(super) async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        crate::observability::render_metrics(),
    )
}
