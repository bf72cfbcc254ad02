//! # Errors
//!
//! `AppError` is the single error type handlers return. Failures from the
//! database driver, body parsing, validation and token verification are
//! converted into one of its variants where they occur, so the classifier can
//! match on a closed set instead of inspecting foreign error shapes.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::domain::aggregates::OrderError;
use crate::response::ApiResponse;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// A value could not be coerced into the expected type (malformed id, bad column data).
    #[error("Cast failed: {0}")]
    Cast(String),

    /// A uniqueness constraint rejected a write.
    #[error("duplicate key value violates unique constraint: {field} = {value:?}")]
    DuplicateKey { field: String, value: String },

    /// One message per failed field validation.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("jwt expired")]
    TokenExpired,

    /// The request body could not be parsed as JSON.
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// An anticipated failure that already carries a client-safe status and message.
    #[error("{message}")]
    Operational { status: StatusCode, message: String },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn operational(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Operational { status, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self { Self::operational(StatusCode::NOT_FOUND, message) }
    pub fn bad_request(message: impl Into<String>) -> Self { Self::operational(StatusCode::BAD_REQUEST, message) }
    pub fn unauthorized(message: impl Into<String>) -> Self { Self::operational(StatusCode::UNAUTHORIZED, message) }
    pub fn forbidden(message: impl Into<String>) -> Self { Self::operational(StatusCode::FORBIDDEN, message) }

    /// Status the error carries before classification. Library-shaped
    /// failures carry none of their own and report 500.
    pub fn raw_status(&self) -> StatusCode {
        match self {
            Self::Operational { status, .. } => *status,
            Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Whether a normalized error is the client's fault or ours.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusClass { Fail, Error }

impl StatusClass {
    pub fn of(status: StatusCode) -> Self {
        if status.is_client_error() { Self::Fail } else { Self::Error }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedError {
    pub status_code: StatusCode,
    pub status: StatusClass,
    pub message: String,
    pub is_operational: bool,
}

impl NormalizedError {
    fn operational(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self { status_code, status: StatusClass::of(status_code), message: message.into(), is_operational: true }
    }

    fn defect() -> Self {
        Self {
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            status: StatusClass::Error,
            message: "Something went wrong".to_string(),
            is_operational: false,
        }
    }
}

/// Maps an error to the status and message a client may see outside development.
pub fn classify(err: &AppError) -> NormalizedError {
    match err {
        AppError::Cast(_) => NormalizedError::operational(StatusCode::NOT_FOUND, "Resource not found"),
        AppError::DuplicateKey { field, .. } => {
            NormalizedError::operational(StatusCode::CONFLICT, format!("{} already exists", capitalize(field)))
        }
        AppError::Validation(messages) => NormalizedError::operational(StatusCode::BAD_REQUEST, messages.join(". ")),
        AppError::InvalidToken(_) => NormalizedError::operational(StatusCode::UNAUTHORIZED, "Invalid token. Please login again"),
        AppError::TokenExpired => NormalizedError::operational(StatusCode::UNAUTHORIZED, "Token expired. Please login again"),
        AppError::MalformedBody(_) => NormalizedError::operational(StatusCode::BAD_REQUEST, "Invalid JSON payload"),
        AppError::Operational { status, message } => {
            let message = if message.is_empty() { "Something went wrong".to_string() } else { message.clone() };
            NormalizedError::operational(*status, message)
        }
        AppError::Database(_) | AppError::Internal(_) => NormalizedError::defect(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Response extension carrying the error that produced a response, so the
/// error middleware can re-render it under the configured policy.
#[derive(Clone, Debug)]
pub struct ErrorSlot(pub Arc<AppError>);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let normalized = classify(&self);
        let mut response = ApiResponse::error_message(normalized.message)
            .with_status(normalized.status_code)
            .into_response();
        response.extensions_mut().insert(ErrorSlot(Arc::new(self)));
        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => {
                    let detail = db
                        .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                        .and_then(|pg| pg.detail())
                        .and_then(parse_unique_violation);
                    match detail {
                        Some((field, value)) => AppError::DuplicateKey { field, value },
                        None => AppError::DuplicateKey {
                            field: db.constraint().unwrap_or("value").to_string(),
                            value: String::new(),
                        },
                    }
                }
                Some("22P02") => AppError::Cast(db.message().to_string()),
                _ => AppError::Database(err),
            },
            sqlx::Error::ColumnDecode { index, source } => AppError::Cast(format!("column {index}: {source}")),
            _ => AppError::Database(err),
        }
    }
}

/// Parses a Postgres unique-violation detail such as
/// `Key (email)=(a@b.co) already exists.` into `("email", "a@b.co")`.
pub fn parse_unique_violation(detail: &str) -> Option<(String, String)> {
    let rest = detail.strip_prefix("Key (")?;
    let (field, rest) = rest.split_once(")=(")?;
    let value = rest.rsplit_once(") already exists")?.0;
    Some((field.to_string(), value.to_string()))
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_messages(&errors, &mut messages);
        AppError::Validation(messages)
    }
}

fn collect_messages(errors: &ValidationErrors, out: &mut Vec<String>) {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by_key(|(name, _)| **name);
    for (field, kind) in fields {
        match kind {
            ValidationErrorsKind::Field(list) => out.extend(list.iter().map(|e| {
                e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| format!("{field} is invalid"))
            })),
            ValidationErrorsKind::Struct(nested) => collect_messages(nested, out),
            ValidationErrorsKind::List(items) => items.values().for_each(|nested| collect_messages(nested, out)),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken(err.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonSyntaxError(e) => AppError::MalformedBody(e.body_text()),
            JsonRejection::JsonDataError(e) => AppError::Validation(vec![e.body_text()]),
            JsonRejection::MissingJsonContentType(e) => AppError::operational(StatusCode::UNSUPPORTED_MEDIA_TYPE, e.body_text()),
            other => AppError::bad_request(other.body_text()),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self { AppError::Cast(rejection.body_text()) }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self { AppError::Internal(format!("unexpected result shape: {err}")) }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::TotalOverflow => AppError::Validation(vec![err.to_string()]),
            other => AppError::bad_request(other.to_string()),
        }
    }
}
