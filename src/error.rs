use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::validation::FieldErrors;

/// Error type for every HTTP handler; renders as `{message, errors?, item_count?}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("The given data was invalid.")]
    Validation(FieldErrors),

    #[error("Unauthenticated.")]
    Unauthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Forbidden,

    #[error("{0} not found.")]
    NotFound(&'static str),

    #[error("{message}")]
    Conflict { message: String, item_count: i64 },

    #[error("{0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Io(_) | AppError::PasswordHash(_) | AppError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

/// Well-formed JSON of the wrong shape is a 422 against the offending field;
/// anything else (bad syntax, wrong content type) is a 400.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => AppError::Validation(data_error_fields(&err.body_text())),
            other => AppError::BadRequest(other.body_text()),
        }
    }
}

/// Pins a serde message (`missing field ...` or `<field>: invalid type ...`) to its field.
fn data_error_fields(text: &str) -> FieldErrors {
    let detail = text.split_once("target type: ").map_or(text, |(_, detail)| detail);
    let detail = detail.split(" at line ").next().unwrap_or(detail);
    let mut errors = FieldErrors::new();

    if let Some(field) = detail.strip_prefix("missing field `").and_then(|rest| rest.split('`').next()) {
        errors.add(field, format!("The {field} field is required."));
        return errors;
    }

    let located = detail.split_once(": ").filter(|(path, _)| {
        !path.is_empty() && path.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'))
    });
    match located {
        Some((field, reason)) => errors.add(field, format!("The {field} field is invalid: {reason}.")),
        None => errors.add("body", detail.to_string()),
    }
    errors
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Validation(errors) => json!({
                "message": self.to_string(),
                "errors": errors,
            }),
            AppError::Conflict {
                message,
                item_count,
            } => json!({
                "message": message,
                "item_count": item_count,
            }),
            AppError::Database(_) | AppError::Io(_) | AppError::PasswordHash(_) | AppError::Task(_) => {
                tracing::error!(error = %self, "Internal error");
                json!({ "message": "Server Error" })
            }
            _ => json!({ "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
