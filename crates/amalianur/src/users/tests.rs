use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{user_router, MemoryUserRepository, RoleGate, UserService, USER_HEADER};

const OWNER: &str = "kepala@amalianur.id";

fn gate() -> RoleGate {
    let users = UserService::new(Arc::new(MemoryUserRepository::default()));
    users.bootstrap_super_admin(OWNER).expect("owner seeded");
    RoleGate::new(users)
}

fn request(method: &str, uri: &str, actor: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_HEADER, actor)
        .header(header::CONTENT_TYPE, "application/json");
    let body = body.map(|value| Body::from(value.to_string())).unwrap_or_else(Body::empty);
    builder.body(body).expect("request builds")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json payload")
}

#[tokio::test]
async fn super_admin_creates_and_deletes_accounts_with_activity_trail() {
    let gate = gate();
    let app = user_router(gate.clone());

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/admin/users",
            OWNER,
            Some(json!({ "email": "Guru@Amalianur.id", "full_name": "Bu Guru" })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["user"]["email"], "guru@amalianur.id");
    assert_eq!(body["user"]["role"], "admin");
    let id = body["userId"].as_str().expect("id").to_string();

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/v1/admin/users/{id}"),
            OWNER,
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["message"],
        "User berhasil dihapus dari sistem."
    );

    let response = app
        .oneshot(request("GET", "/api/v1/admin/activity-logs", OWNER, None))
        .await
        .expect("response");
    let logs = json_body(response).await;
    let actions: Vec<&str> = logs
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|entry| entry["action"].as_str())
        .collect();
    assert!(actions.contains(&"Create User"));
    assert!(actions.contains(&"Delete User"));
}

#[tokio::test]
async fn missing_email_is_rejected() {
    let response = user_router(gate())
        .oneshot(request(
            "POST",
            "/api/v1/admin/users",
            OWNER,
            Some(json!({ "full_name": "Tanpa Email" })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Email required");
}

#[tokio::test]
async fn admins_cannot_manage_users() {
    let gate = gate();
    gate.users()
        .create_user(
            crate::users::CreateUserRequest {
                email: "admin@amalianur.id".to_string(),
                ..Default::default()
            },
            OWNER,
        )
        .expect("admin seeded");

    let response = user_router(gate)
        .oneshot(request("GET", "/api/v1/admin/users", "admin@amalianur.id", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
