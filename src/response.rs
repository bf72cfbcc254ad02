//! # Response Envelope
//!
//! Every reply leaves the service as
//! `{success, type, message, data?, error?, stack?, timestamp}`.

use std::error::Error as StdError;
use std::fmt::Write as _;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Mode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind { Success, Error }

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// An envelope plus the status code it is sent with.
#[derive(Debug, Clone)]
pub struct ApiResponse<T: Serialize = ()> {
    pub status: StatusCode,
    pub body: Envelope<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// `200` with a payload.
    pub fn data(payload: T) -> Self {
        Self::build(StatusCode::OK, EnvelopeKind::Success, "Success", Some(payload))
    }
}

impl ApiResponse<()> {
    /// `200` with a message only.
    pub fn success(message: impl Into<String>) -> Self {
        Self::build(StatusCode::OK, EnvelopeKind::Success, message, None)
    }

    /// `500` describing `err`. The raw error text and its source chain are
    /// attached only in development mode.
    pub fn error(err: &(dyn StdError + 'static), mode: Mode) -> Self {
        let mut response = Self::build(StatusCode::INTERNAL_SERVER_ERROR, EnvelopeKind::Error, "Something went wrong", None);
        if mode.is_development() {
            response.body.error = Some(err.to_string());
            response.body.stack = Some(render_chain(err));
        }
        response
    }

    /// `400` with a client-safe message and nothing else.
    pub fn error_message(message: impl Into<String>) -> Self {
        Self::build(StatusCode::BAD_REQUEST, EnvelopeKind::Error, message, None)
    }
}

impl<T: Serialize> ApiResponse<T> {
    fn build(status: StatusCode, kind: EnvelopeKind, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status,
            body: Envelope {
                success: kind == EnvelopeKind::Success,
                kind,
                message: message.into(),
                data,
                error: None,
                stack: None,
                timestamp: Utc::now(),
            },
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.body.message = message.into();
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response { (self.status, Json(self.body)).into_response() }
}

fn render_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = format!("Error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(out, "\n    caused by: {cause}");
        source = cause.source();
    }
    out
}
