use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::users::{Role, RoleGate};

use super::console::{Letterhead, RecordDetail};
use super::domain::{
    EnrollmentSettings, EnrollmentSubmission, FeeSchedule, FormCopy, LandingPage, RecordId,
};
use super::export::export_records;
use super::form::render_form;
use super::notify::EmailMessage;
use super::repository::EnrollmentRepository;
use super::service::{
    EnrollmentService, FeeScheduleInput, FormCopyInput, LandingPageInput, SettingsInput,
    SubmitOutcome,
};
use super::storage::Upload;
use super::Tier;

/// Request bodies above this are refused by the framework. Kept above the 5 MB
/// upload policy so oversized files reach the policy and get its message.
pub const UPLOAD_BODY_LIMIT: usize = 8 * 1024 * 1024;

pub struct EnrollmentState<R> {
    pub service: Arc<EnrollmentService<R>>,
    pub gate: RoleGate,
}

impl<R> Clone for EnrollmentState<R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            gate: self.gate.clone(),
        }
    }
}

/// Public form endpoints, the admin console API, and notification endpoints.
pub fn enrollment_router<R>(service: Arc<EnrollmentService<R>>, gate: RoleGate) -> Router
where
    R: EnrollmentRepository + 'static,
{
    Router::new()
        .route("/api/v1/enrollment/form", get(form_handler::<R>))
        .route("/api/v1/enrollment/landing", get(public_landing_handler::<R>))
        .route("/api/v1/enrollment/fee", get(fee_handler::<R>))
        .route("/api/v1/enrollment/documents", post(document_handler::<R>))
        .route("/api/v1/enrollment/submissions", post(submit_handler::<R>))
        .route("/api/v1/admin/enrollment/records", get(list_handler::<R>))
        .route(
            "/api/v1/admin/enrollment/records/:id",
            get(record_handler::<R>).delete(delete_handler::<R>),
        )
        .route(
            "/api/v1/admin/enrollment/records/:id/print",
            get(print_handler::<R>),
        )
        .route(
            "/api/v1/admin/enrollment/delete-all",
            delete(delete_all_handler::<R>).post(delete_all_handler::<R>),
        )
        .route("/api/v1/admin/enrollment/export", get(export_handler::<R>))
        .route(
            "/api/v1/admin/enrollment/fees",
            get(get_fees_handler::<R>).put(put_fees_handler::<R>),
        )
        .route(
            "/api/v1/admin/enrollment/settings",
            get(get_settings_handler::<R>).put(put_settings_handler::<R>),
        )
        .route(
            "/api/v1/admin/enrollment/settings/toggle",
            post(toggle_handler::<R>),
        )
        .route(
            "/api/v1/admin/enrollment/form-copy",
            get(get_copy_handler::<R>).put(put_copy_handler::<R>),
        )
        .route(
            "/api/v1/admin/enrollment/landing",
            get(get_landing_handler::<R>).put(put_landing_handler::<R>),
        )
        .route(
            "/api/v1/admin/enrollment/landing/image",
            post(landing_image_handler::<R>),
        )
        .route("/api/v1/notifications/email", post(email_handler::<R>))
        .route(
            "/api/v1/notifications/enrollment",
            post(renotify_handler::<R>),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(EnrollmentState { service, gate })
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TierQuery {
    pub(crate) tier: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UploadQuery {
    file_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeleteAllRequest {
    #[serde(default)]
    confirmed: bool,
    #[serde(default)]
    phrase: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RenotifyRequest {
    record_id: String,
}

/// Build an [`Upload`] from a raw request body.
pub(crate) fn upload_from_request(headers: &HeaderMap, file_name: Option<String>, body: Bytes) -> Upload {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    Upload {
        file_name: file_name.unwrap_or_else(|| "upload".to_string()),
        content_type,
        bytes: body.to_vec(),
    }
}

pub(crate) async fn form_handler<R>(
    State(state): State<EnrollmentState<R>>,
    Query(query): Query<TierQuery>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    let snapshot = state.service.snapshot()?;
    let tier = query.tier.as_deref().and_then(Tier::parse);
    Ok(Json(render_form(&snapshot, tier)).into_response())
}

pub(crate) async fn public_landing_handler<R>(
    State(state): State<EnrollmentState<R>>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    Ok(Json(state.service.load::<LandingPage>()?).into_response())
}

pub(crate) async fn fee_handler<R>(
    State(state): State<EnrollmentState<R>>,
    Query(query): Query<TierQuery>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    Ok(Json(state.service.fee_quote(query.tier.as_deref())?).into_response())
}

pub(crate) async fn document_handler<R>(
    State(state): State<EnrollmentState<R>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    let upload = upload_from_request(&headers, query.file_name, body);
    let stored = state.service.upload_document(upload).await?;
    Ok((StatusCode::CREATED, Json(stored)).into_response())
}

pub(crate) async fn submit_handler<R>(
    State(state): State<EnrollmentState<R>>,
    Json(submission): Json<EnrollmentSubmission>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    match state.service.submit(submission).await? {
        SubmitOutcome::Accepted(receipt) => Ok((StatusCode::CREATED, Json(receipt)).into_response()),
        SubmitOutcome::NeedsConfirmation { prompt } => {
            let payload = json!({
                "error": prompt,
                "requires_confirmation": true,
            });
            Ok((StatusCode::PRECONDITION_REQUIRED, Json(payload)).into_response())
        }
    }
}

pub(crate) async fn list_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    Ok(Json(state.service.list_records()?).into_response())
}

pub(crate) async fn record_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    Ok(Json(state.service.fetch_record(&RecordId(id))?).into_response())
}

pub(crate) async fn delete_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    let id = RecordId(id);
    state.service.delete_record(&id)?;
    Ok(Json(json!({ "deleted": id })).into_response())
}

pub(crate) async fn print_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    let record = state.service.fetch_record(&RecordId(id))?;
    let landing = state.service.load::<LandingPage>()?.value;
    let detail = RecordDetail {
        letterhead: Letterhead::from(&landing),
        record,
    };
    Ok(Html(detail.print_html()).into_response())
}

pub(crate) async fn delete_all_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
    Json(request): Json<DeleteAllRequest>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    let summary = state
        .service
        .delete_all(request.confirmed, &request.phrase)?;
    Ok(Json(summary).into_response())
}

pub(crate) async fn export_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    let records = state.service.list_records()?;
    let file = export_records(&records)?;
    let disposition = format!("attachment; filename=\"{}\"", file.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

pub(crate) async fn get_fees_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    Ok(Json(state.service.load::<FeeSchedule>()?).into_response())
}

pub(crate) async fn put_fees_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
    Json(input): Json<FeeScheduleInput>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    let row = state.service.save::<FeeSchedule, _>(input)?;
    Ok(Json(row).into_response())
}

pub(crate) async fn get_settings_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    Ok(Json(state.service.load::<EnrollmentSettings>()?).into_response())
}

pub(crate) async fn put_settings_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
    Json(input): Json<SettingsInput>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    let row = state.service.save::<EnrollmentSettings, _>(input)?;
    Ok(Json(row).into_response())
}

pub(crate) async fn toggle_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    Ok(Json(state.service.toggle_open()?).into_response())
}

pub(crate) async fn get_copy_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    Ok(Json(state.service.load::<FormCopy>()?).into_response())
}

pub(crate) async fn put_copy_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
    Json(input): Json<FormCopyInput>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    let row = state.service.save::<FormCopy, _>(input)?;
    Ok(Json(row).into_response())
}

pub(crate) async fn get_landing_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    Ok(Json(state.service.load::<LandingPage>()?).into_response())
}

pub(crate) async fn put_landing_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
    Json(input): Json<LandingPageInput>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    let row = state.service.save::<LandingPage, _>(input)?;
    Ok(Json(row).into_response())
}

pub(crate) async fn landing_image_handler<R>(
    State(state): State<EnrollmentState<R>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    let upload = upload_from_request(&headers, query.file_name, body);
    let row = state.service.upload_landing_image(upload).await?;
    Ok((StatusCode::CREATED, Json(row)).into_response())
}

pub(crate) async fn email_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
    Json(message): Json<EmailMessage>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    state.service.send_email(&message).await?;
    Ok(Json(json!({ "success": true })).into_response())
}

pub(crate) async fn renotify_handler<R>(
    State(state): State<EnrollmentState<R>>,
    headers: HeaderMap,
    Json(request): Json<RenotifyRequest>,
) -> Result<Response, ApiError>
where
    R: EnrollmentRepository + 'static,
{
    state.gate.authorize(&headers, Role::ENROLLMENT)?;
    let record_id = request.record_id.trim();
    if record_id.is_empty() {
        return Err(ApiError::BadRequest("record_id wajib diisi".to_string()));
    }
    state
        .service
        .notify_admin(&RecordId(record_id.to_string()))
        .await?;
    Ok(Json(json!({ "success": true })).into_response())
}
