use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde_json::json;

use crate::error::ApiError;

use super::access::RoleGate;
use super::domain::{CreateUserRequest, Role};

/// Super-admin endpoints for account management.
pub fn user_router(gate: RoleGate) -> Router {
    Router::new()
        .route(
            "/api/v1/admin/users",
            get(list_handler).post(create_handler),
        )
        .route("/api/v1/admin/users/:id", delete(delete_handler))
        .route("/api/v1/admin/activity-logs", get(activity_handler))
        .with_state(gate)
}

async fn list_handler(State(gate): State<RoleGate>, headers: HeaderMap) -> Result<Response, ApiError> {
    gate.authorize(&headers, Role::USER_MANAGEMENT)?;
    Ok(Json(gate.users().list()?).into_response())
}

async fn create_handler(
    State(gate): State<RoleGate>,
    headers: HeaderMap,
    Json(request): Json<CreateUserRequest>,
) -> Result<Response, ApiError> {
    let identity = gate.authorize(&headers, Role::USER_MANAGEMENT)?;
    let account = gate.users().create_user(request, &identity.email)?;
    Ok((
        StatusCode::OK,
        Json(json!({ "ok": true, "userId": account.id, "user": account })),
    )
        .into_response())
}

async fn delete_handler(
    State(gate): State<RoleGate>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let identity = gate.authorize(&headers, Role::USER_MANAGEMENT)?;
    gate.users().delete_user(&id, &identity.email)?;
    Ok(Json(json!({
        "success": true,
        "message": "User berhasil dihapus dari sistem.",
    }))
    .into_response())
}

async fn activity_handler(
    State(gate): State<RoleGate>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    gate.authorize(&headers, Role::USER_MANAGEMENT)?;
    Ok(Json(gate.users().activity()?).into_response())
}
