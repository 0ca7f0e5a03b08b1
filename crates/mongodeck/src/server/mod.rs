//! HTTP surface: shared state, routes and the listener loop

mod browse;
mod connections;
mod history;
mod http;

use std::fmt;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::routing::get;
use axum::{Router, middleware};
use mongodb::Client;

pub use http::run;

use crate::auth::{AuthState, auth_middleware};
use crate::cache::{ClientFactory, ClientHandle, ConnectionCache};
use crate::client::MongoClientFactory;
use crate::gateway::PageLimits;
use crate::store::{ConnectionRecord, ConnectionStore, QueryHistoryStore};
use crate::{Error, Result};

/// Services shared by every handler
///
/// Generic over the factory so the routes can run against clients that
/// never touch the network.
pub struct AppState<F: ClientFactory = MongoClientFactory> {
    pub cache: ConnectionCache<F>,
    pub connections: Arc<dyn ConnectionStore>,
    pub history: Arc<dyn QueryHistoryStore>,
    pub limits: PageLimits,
}

impl<F: ClientFactory> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            connections: Arc::clone(&self.connections),
            history: Arc::clone(&self.history),
            limits: self.limits,
        }
    }
}

impl<F: ClientFactory> fmt::Debug for AppState<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("cache", &self.cache)
            .field("connections", &"<ConnectionStore>")
            .field("history", &"<QueryHistoryStore>")
            .field("limits", &self.limits)
            .finish()
    }
}

impl<F: ClientFactory<Client = Client>> AppState<F> {
    #[must_use]
    pub fn new(
        cache: ConnectionCache<F>,
        connections: Arc<dyn ConnectionStore>,
        history: Arc<dyn QueryHistoryStore>,
        limits: PageLimits,
    ) -> Self {
        Self {
            cache,
            connections,
            history,
            limits,
        }
    }

    /// Ready client for a record the caller has already been checked against
    async fn client_for(&self, record: &ConnectionRecord) -> Result<ClientHandle<Client>> {
        Ok(self
            .cache
            .get_or_create(&record.id, &record.to_config())
            .await?)
    }
}

/// Build the application router.
///
/// `/health` and `/metrics` are public; everything else runs behind the
/// bearer authentication middleware.
pub fn router<F>(state: AppState<F>, auth: AuthState) -> Router
where
    F: ClientFactory<Client = Client>,
{
    let protected = Router::new()
        .route(
            "/connections",
            get(connections::list::<F>).post(connections::create::<F>),
        )
        .route(
            "/connections/{id}",
            get(connections::show::<F>)
                .patch(connections::update::<F>)
                .delete(connections::remove::<F>),
        )
        .route("/connections/{id}/databases", get(browse::databases::<F>))
        .route(
            "/connections/{id}/{db}/collections",
            get(browse::collections::<F>),
        )
        .route(
            "/connections/{id}/{db}/{coll}/documents",
            get(browse::documents::<F>)
                .patch(browse::update_document::<F>)
                .delete(browse::delete_document::<F>),
        )
        .route(
            "/query-history",
            get(history::list::<F>)
                .post(history::record::<F>)
                .delete(history::clear::<F>),
        )
        .route_layer(middleware::from_fn_with_state(auth, auth_middleware));

    #[allow(unused_mut)]
    let mut public = Router::new().route("/health", get(http::health_handler::<F>));

    #[cfg(feature = "metrics")]
    {
        public = public.route("/metrics", get(http::metrics_handler));
    }

    public.merge(protected).with_state(state)
}

/// Unwrap a JSON body, reporting malformed input in the usual error shape
fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| Error::BadRequest(rejection.body_text()))
}
