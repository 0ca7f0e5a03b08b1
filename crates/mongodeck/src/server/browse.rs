//! Namespace listing and single-document edits
//!
//! Each handler resolves the caller's record first (404), parses its input
//! second (400) and only then asks the cache for a client.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use mongodb::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{AppState, json_body};
use crate::Result;
use crate::auth::CallerId;
use crate::cache::ClientFactory;
use crate::gateway::{
    self, CollectionSummary, DatabaseSummary, DeleteOutcome, DocumentPage, UpdateOutcome,
};
use crate::store::ConnectionRecord;

/// `limit`, `skip` and `query` arrive as raw strings so bad values map to 400
#[derive(Debug, Deserialize)]
pub(super) struct DocumentsQuery {
    limit: Option<String>,
    skip: Option<String>,
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateBody {
    #[serde(default)]
    document_id: Value,
    #[serde(default)]
    update: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DeleteBody {
    #[serde(default)]
    document_id: Value,
}

async fn owned_record<F: ClientFactory<Client = Client>>(
    state: &AppState<F>,
    caller: &CallerId,
    id: &str,
) -> Result<ConnectionRecord> {
    Ok(state
        .connections
        .get_for_owner(caller.as_str(), id)
        .await?)
}

pub(super) async fn databases<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
    Path(id): Path<String>,
) -> Result<Json<Vec<DatabaseSummary>>> {
    let record = owned_record(&state, &caller, &id).await?;
    let client = state.client_for(&record).await?;
    Ok(Json(gateway::list_databases(&client).await?))
}

pub(super) async fn collections<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
    Path((id, db)): Path<(String, String)>,
) -> Result<Json<Vec<CollectionSummary>>> {
    let record = owned_record(&state, &caller, &id).await?;
    let client = state.client_for(&record).await?;
    Ok(Json(gateway::list_collections(&client, &db).await?))
}

pub(super) async fn documents<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
    Path((id, db, coll)): Path<(String, String, String)>,
    Query(params): Query<DocumentsQuery>,
) -> Result<Json<DocumentPage>> {
    let record = owned_record(&state, &caller, &id).await?;
    let page = state
        .limits
        .resolve(params.limit.as_deref(), params.skip.as_deref())?;
    let filter = gateway::parse_filter(params.query.as_deref())?;

    let client = state.client_for(&record).await?;
    let result = gateway::find_documents(&client, &db, &coll, filter, page).await?;
    tracing::debug!(
        connection.id = %record.id,
        db = %db,
        collection = %coll,
        returned = result.documents.len(),
        total = result.total,
        "Documents listed"
    );
    Ok(Json(result))
}

pub(super) async fn update_document<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
    Path((id, db, coll)): Path<(String, String, String)>,
    body: std::result::Result<Json<UpdateBody>, JsonRejection>,
) -> Result<Json<UpdateOutcome>> {
    let record = owned_record(&state, &caller, &id).await?;
    let body = json_body(body)?;
    let document_id = gateway::parse_document_id(&body.document_id)?;
    let update = gateway::parse_update(body.update)?;

    let client = state.client_for(&record).await?;
    let outcome = gateway::update_document(&client, &db, &coll, document_id, update).await?;
    tracing::info!(connection.id = %record.id, db = %db, collection = %coll, "Document updated");
    Ok(Json(outcome))
}

pub(super) async fn delete_document<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
    Path((id, db, coll)): Path<(String, String, String)>,
    body: std::result::Result<Json<DeleteBody>, JsonRejection>,
) -> Result<Json<DeleteOutcome>> {
    let record = owned_record(&state, &caller, &id).await?;
    let body = json_body(body)?;
    let document_id = gateway::parse_document_id(&body.document_id)?;

    let client = state.client_for(&record).await?;
    let outcome = gateway::delete_document(&client, &db, &coll, document_id).await?;
    tracing::info!(connection.id = %record.id, db = %db, collection = %coll, "Document deleted");
    Ok(Json(outcome))
}
