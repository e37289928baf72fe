use std::sync::atomic::Ordering;

use amalianur::content::content_router;
use amalianur::enrollment::enrollment_router;
use amalianur::users::user_router;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;

use crate::infra::{AppState, Backoffice};

/// Operational endpoints plus every back-office router.
pub(crate) fn with_backoffice_routes(backoffice: Backoffice) -> Router {
    let Backoffice {
        enrollment,
        gate,
        collections,
        files: _,
    } = backoffice;

    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/files/:bucket/*path", get(file_endpoint))
        .merge(enrollment_router(enrollment, gate.clone()))
        .merge(user_router(gate.clone()))
        .merge(content_router(collections, gate))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Public URLs handed out for uploaded documents and images resolve here.
pub(crate) async fn file_endpoint(
    Extension(state): Extension<AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> Response {
    match state.files.read(&bucket, &path).await {
        Some(bytes) => {
            let content_type = mime_guess::from_path(&path)
                .first_or_octet_stream()
                .essence_str()
                .to_string();
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "file tidak ditemukan" })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use amalianur::enrollment::LocalDocumentStorage;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    use super::*;

    fn state(ready: bool, root: &std::path::Path) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
            files: Arc::new(LocalDocumentStorage::new(root, "http://localhost/files")),
        }
    }

    fn ops_router(state: AppState) -> Router {
        Router::new()
            .route("/ready", get(readiness_endpoint))
            .route("/files/:bucket/*path", get(file_endpoint))
            .layer(Extension(state))
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_follows_flag() {
        let root = std::env::temp_dir();
        let response = ops_router(state(false, &root))
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = ops_router(state(true, &root))
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stored_files_are_served_with_guessed_type() {
        let root = std::env::temp_dir().join(format!("amalianur-files-{}", std::process::id()));
        let target = root.join("pendaftaran");
        std::fs::create_dir_all(&target).expect("bucket dir");
        std::fs::write(target.join("kk.png"), b"png").expect("file written");
        let app = ops_router(state(true, &root));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/files/pendaftaran/kk.png")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/files/rahasia/kk.png")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(&root).ok();
    }
}
