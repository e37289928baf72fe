use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::enrollment::router::{upload_from_request, UPLOAD_BODY_LIMIT};
use crate::error::ApiError;
use crate::users::{Role, RoleGate};

use super::collection::{ContentError, ManagedCollections};

#[derive(Clone)]
pub struct ContentState {
    pub collections: ManagedCollections,
    pub gate: RoleGate,
}

#[derive(Debug, Default, Deserialize)]
struct UploadQuery {
    file_name: Option<String>,
}

/// Public listing plus editor-level mutations for every managed collection.
pub fn content_router(collections: ManagedCollections, gate: RoleGate) -> Router {
    Router::new()
        .route("/api/v1/content/:collection", get(list_handler))
        .route("/api/v1/admin/content/:collection", post(create_handler))
        .route(
            "/api/v1/admin/content/:collection/:id",
            put(update_handler).delete(delete_handler),
        )
        .route("/api/v1/pages/:page", get(page_handler))
        .route("/api/v1/admin/pages/:page", put(save_page_handler))
        .route("/api/v1/admin/uploads/:collection", post(upload_handler))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(ContentState { collections, gate })
}

async fn list_handler(
    State(state): State<ContentState>,
    Path(collection): Path<String>,
) -> Result<Response, ApiError> {
    let kind = ManagedCollections::kind(&collection)?;
    Ok(Json(state.collections.list(kind)?).into_response())
}

async fn create_handler(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path(collection): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    state.gate.authorize(&headers, Role::CONTENT)?;
    let kind = ManagedCollections::kind(&collection)?;
    let item = state.collections.create(kind, payload)?;
    Ok((StatusCode::CREATED, Json(item)).into_response())
}

async fn update_handler(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    state.gate.authorize(&headers, Role::CONTENT)?;
    let kind = ManagedCollections::kind(&collection)?;
    Ok(Json(state.collections.update(kind, &id, payload)?).into_response())
}

async fn delete_handler(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    state.gate.authorize(&headers, Role::CONTENT)?;
    let kind = ManagedCollections::kind(&collection)?;
    state.collections.delete(kind, &id)?;
    Ok(Json(json!({ "deleted": id })).into_response())
}

async fn page_handler(
    State(state): State<ContentState>,
    Path(page): Path<String>,
) -> Result<Response, ApiError> {
    let kind = ManagedCollections::page_kind(&page)?;
    let item = state.collections.page(kind)?.ok_or(ContentError::NotFound)?;
    Ok(Json(item).into_response())
}

async fn save_page_handler(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path(page): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    state.gate.authorize(&headers, Role::CONTENT)?;
    let kind = ManagedCollections::page_kind(&page)?;
    Ok(Json(state.collections.save_page(kind, payload)?).into_response())
}

async fn upload_handler(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path(collection): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    state.gate.authorize(&headers, Role::CONTENT)?;
    ManagedCollections::kind(&collection)?;
    let upload = upload_from_request(&headers, query.file_name, body);
    let stored = state.collections.upload_image(upload).await?;
    Ok((StatusCode::CREATED, Json(stored)).into_response())
}
