use crate::config::ConfigError;
use crate::content::ContentError;
use crate::enrollment::export::ExportError;
use crate::enrollment::notify::NotifyError;
use crate::enrollment::storage::UploadError;
use crate::enrollment::EnrollmentError;
use crate::store::RepositoryError;
use crate::telemetry::TelemetryError;
use crate::users::{AccessError, UserError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

/// Process-level failures: startup, configuration, and the server loop.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Export(ExportError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Export(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ExportError> for AppError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

/// Request-level failures rendered as `{"error": "..."}` with a fitting status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Users(#[from] UserError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Access(AccessError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            ApiError::Access(AccessError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            ApiError::Access(AccessError::Directory(err)) | ApiError::Users(err) => {
                user_status(err)
            }
            ApiError::Enrollment(err) => enrollment_status(err),
            ApiError::Export(ExportError::Empty) => StatusCode::BAD_REQUEST,
            ApiError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Content(err) => content_status(err),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

fn user_status(err: &UserError) -> StatusCode {
    match err {
        UserError::EmailRequired | UserError::IdRequired => StatusCode::BAD_REQUEST,
        UserError::NotFound => StatusCode::NOT_FOUND,
        UserError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn upload_status(err: &UploadError) -> StatusCode {
    match err {
        UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        UploadError::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        UploadError::Empty => StatusCode::BAD_REQUEST,
        UploadError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::ForeignKey { .. } | RepositoryError::Duplicate { .. } => {
            StatusCode::CONFLICT
        }
        RepositoryError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn enrollment_status(err: &EnrollmentError) -> StatusCode {
    match err {
        EnrollmentError::Closed => StatusCode::CONFLICT,
        EnrollmentError::Validation(_)
        | EnrollmentError::ConfirmationRequired
        | EnrollmentError::NothingToDelete => StatusCode::BAD_REQUEST,
        EnrollmentError::Upload(err) => upload_status(err),
        EnrollmentError::Repository(err) => repository_status(err),
        EnrollmentError::Notify(NotifyError::InvalidMessage(_)) => StatusCode::BAD_REQUEST,
        EnrollmentError::Notify(NotifyError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
        EnrollmentError::Notify(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn content_status(err: &ContentError) -> StatusCode {
    match err {
        ContentError::UnknownCollection(_) | ContentError::NotFound | ContentError::NotAPage(_) => {
            StatusCode::NOT_FOUND
        }
        ContentError::MissingField { .. } | ContentError::NotAnObject => StatusCode::BAD_REQUEST,
        ContentError::Upload(err) => upload_status(err),
        ContentError::Repository(err) => repository_status(err),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        }

        let body = match &self {
            ApiError::Access(access) => match access.redirect() {
                Some(redirect) => json!({ "error": self.to_string(), "redirect": redirect }),
                None => json!({ "error": self.to_string() }),
            },
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
