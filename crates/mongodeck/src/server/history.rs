//! Per-caller query history

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use mongodb::Client;

use super::{AppState, json_body};
use crate::Result;
use crate::auth::CallerId;
use crate::cache::ClientFactory;
use crate::store::{HistoryEntry, NewHistoryEntry};

pub(super) async fn list<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
) -> Result<Json<Vec<HistoryEntry>>> {
    Ok(Json(state.history.list_for_owner(caller.as_str()).await?))
}

pub(super) async fn record<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
    body: std::result::Result<Json<NewHistoryEntry>, JsonRejection>,
) -> Result<(StatusCode, Json<HistoryEntry>)> {
    let entry = json_body(body)?;
    let saved = state.history.record(caller.as_str(), entry).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub(super) async fn clear<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
) -> Result<StatusCode> {
    let removed = state.history.clear_for_owner(caller.as_str()).await?;
    tracing::debug!(caller = %caller, removed, "Query history cleared");
    Ok(StatusCode::NO_CONTENT)
}
