//! Saved connection CRUD

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use mongodb::Client;

use super::{AppState, json_body};
use crate::auth::CallerId;
use crate::cache::ClientFactory;
use crate::client::map_driver_error;
use crate::store::{ConnectionPatch, NewConnection, SafeConnection};
use crate::{Error, Result, gateway};

pub(super) async fn list<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
) -> Result<Json<Vec<SafeConnection>>> {
    let records = state.connections.list_for_owner(caller.as_str()).await?;
    Ok(Json(records.iter().map(|r| r.to_safe()).collect()))
}

pub(super) async fn create<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
    body: std::result::Result<Json<NewConnection>, JsonRejection>,
) -> Result<(StatusCode, Json<SafeConnection>)> {
    let new = json_body(body)?;
    let record = state.connections.create(caller.as_str(), new).await?;
    tracing::info!(connection.id = %record.id, caller = %caller, "Connection saved");
    Ok((StatusCode::CREATED, Json(record.to_safe())))
}

/// Fetch one record and prove the target is reachable
pub(super) async fn show<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
    Path(id): Path<String>,
) -> Result<Json<SafeConnection>> {
    let record = state
        .connections
        .get_for_owner(caller.as_str(), &id)
        .await?;
    let client = state.client_for(&record).await?;

    // A resident client may point at a server that has since gone away
    gateway::ping(&client).await.map_err(|e| match e {
        Error::Database(err) => Error::Connect(map_driver_error(&err, &record.to_config())),
        other => other,
    })?;

    Ok(Json(record.to_safe()))
}

pub(super) async fn update<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
    Path(id): Path<String>,
    body: std::result::Result<Json<ConnectionPatch>, JsonRejection>,
) -> Result<Json<SafeConnection>> {
    let patch = json_body(body)?;
    let record = state
        .connections
        .update_for_owner(caller.as_str(), &id, patch)
        .await?;

    // The stored target changed; the next request must build against it
    state.cache.invalidate(&record.id).await;
    tracing::info!(connection.id = %record.id, "Connection updated");
    Ok(Json(record.to_safe()))
}

pub(super) async fn remove<F: ClientFactory<Client = Client>>(
    State(state): State<AppState<F>>,
    caller: CallerId,
    Path(id): Path<String>,
) -> Result<Json<SafeConnection>> {
    let record = state
        .connections
        .delete_for_owner(caller.as_str(), &id)
        .await?;

    state.cache.invalidate(&record.id).await;
    tracing::info!(connection.id = %record.id, "Connection deleted");
    Ok(Json(record.to_safe()))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::testing::*;

    #[tokio::test]
    async fn test_create_and_list() {
        let app = test_app(test_state());

        let response = send(
            &app,
            "POST",
            "/connections",
            Some(ALICE),
            Some(json!({
                "name": "local",
                "hostname": "localhost",
                "port": 27017,
                "username": "admin",
                "password": "s3cret",
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["name"], "local");
        assert_eq!(created["hostname"], "localhost");
        assert!(created.get("password").is_none());
        assert!(created.get("uri").is_none());
        assert!(created.get("createdAt").is_some());

        let response = send(&app, "GET", "/connections", Some(ALICE), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let listed = body_json(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], created["id"]);

        let response = send(&app, "GET", "/connections", Some(BOB), None).await;
        assert!(body_json(response).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_validation() {
        let app = test_app(test_state());

        let response = send(
            &app,
            "POST",
            "/connections",
            Some(ALICE),
            Some(json!({ "name": "no target" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_create_malformed_body() {
        let app = test_app(test_state());

        let response = send(
            &app,
            "POST",
            "/connections",
            Some(ALICE),
            Some(json!({ "name": 42 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_update_and_delete_scoped_to_owner() {
        let state = test_state();
        let app = test_app(state.clone());

        let response = send(
            &app,
            "POST",
            "/connections",
            Some(ALICE),
            Some(json!({ "name": "prod", "uri": "mongodb://db.internal:27017" })),
        )
        .await;
        let id = body_json(response).await["id"].as_str().unwrap().to_owned();
        let path = format!("/connections/{id}");

        // Someone else's record looks missing
        let response = send(
            &app,
            "PATCH",
            &path,
            Some(BOB),
            Some(json!({ "name": "mine now" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = send(&app, "DELETE", &path, Some(BOB), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &app,
            "PATCH",
            &path,
            Some(ALICE),
            Some(json!({ "name": "prod-eu" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["name"], "prod-eu");

        let response = send(&app, "DELETE", &path, Some(ALICE), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.cache.is_empty());

        let response = send(&app, "DELETE", &path, Some(ALICE), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn create_connection(app: &axum::Router, uri: &str) -> String {
        let response = send(
            app,
            "POST",
            "/connections",
            Some(ALICE),
            Some(json!({ "name": "local", "uri": uri })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn test_update_and_delete_drop_cached_client() {
        let state = test_state();
        let app = test_app(state.clone());
        let id = create_connection(&app, "mongodb://127.0.0.1:1").await;
        let path = format!("/connections/{id}");

        warm_cache(&state, "alice", &id).await;

        // A rejected edit leaves the client alone
        let response = send(&app, "PATCH", &path, Some(BOB), Some(json!({ "name": "x" }))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(state.cache.contains(&id));
        assert_eq!(state.cache.stats().invalidations, 0);

        let response = send(
            &app,
            "PATCH",
            &path,
            Some(ALICE),
            Some(json!({ "name": "renamed" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state.cache.contains(&id));
        assert_eq!(state.cache.stats().invalidations, 1);

        warm_cache(&state, "alice", &id).await;

        let response = send(&app, "DELETE", &path, Some(ALICE), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state.cache.contains(&id));
        assert_eq!(state.cache.stats().invalidations, 2);
        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_show_unreachable_target_is_connect_error() {
        let state = test_state();
        let app = test_app(state.clone());
        let id = create_connection(&app, "mongodb://127.0.0.1:1").await;

        let response = send(&app, "GET", &format!("/connections/{id}"), Some(ALICE), None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["code"], "connection_refused");
    }

    #[tokio::test]
    async fn test_show_foreign_connection_is_not_found() {
        let state = test_state();
        let app = test_app(state.clone());

        let response = send(
            &app,
            "POST",
            "/connections",
            Some(ALICE),
            Some(json!({ "name": "prod", "uri": "mongodb://db.internal:27017" })),
        )
        .await;
        let id = body_json(response).await["id"].as_str().unwrap().to_owned();

        let response = send(&app, "GET", &format!("/connections/{id}"), Some(BOB), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.cache.stats().misses, 0);
    }
}
