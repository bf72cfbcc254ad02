//! # Error Middleware
//!
//! Layers that turn handler failures into enveloped replies. Handlers return
//! `AppError`, whose response carries an [`ErrorSlot`]; the layers below find
//! the slot and decide what the client sees.
//!
//! Order, innermost first: [`panic_to_error`] (via `CatchPanicLayer`),
//! [`malformed_body_filter`], [`error_classifier`].

use std::any::Any;

use axum::extract::{OriginalUri, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::Mode;
use crate::error::{classify, AppError, ErrorSlot};
use crate::response::ApiResponse;

/// How much of an error the classifier may reveal.
#[derive(Clone, Copy, Debug)]
pub struct ErrorPolicy {
    pub mode: Mode,
}

impl ErrorPolicy {
    pub fn new(mode: Mode) -> Self { Self { mode } }

    pub fn render(&self, err: &AppError) -> Response {
        if self.mode.is_development() {
            tracing::error!(error = %err, "request failed");
            return ApiResponse::error(err, self.mode)
                .with_message(err.to_string())
                .with_status(err.raw_status())
                .into_response();
        }
        let normalized = classify(err);
        if normalized.is_operational {
            tracing::debug!(status = normalized.status_code.as_u16(), error = %err, "request rejected");
        } else {
            tracing::error!(error = %err, "unhandled error");
        }
        ApiResponse::error_message(normalized.message)
            .with_status(normalized.status_code)
            .into_response()
    }
}

/// Terminal error handler: every response produced from an `AppError` is
/// re-rendered here under the configured policy.
pub async fn error_classifier(State(policy): State<ErrorPolicy>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    match response.extensions().get::<ErrorSlot>().cloned() {
        Some(ErrorSlot(err)) => policy.render(&err),
        None => response,
    }
}

/// Answers unparsable JSON bodies before the classifier sees them.
pub async fn malformed_body_filter(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let malformed = matches!(
        response.extensions().get::<ErrorSlot>(),
        Some(ErrorSlot(err)) if matches!(**err, AppError::MalformedBody(_))
    );
    if malformed {
        return ApiResponse::error_message("Invalid JSON payload").into_response();
    }
    response
}

/// Fallback for requests that match no route.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> ApiResponse {
    ApiResponse::error_message(format!("Route {} not found", uri.path())).with_status(StatusCode::NOT_FOUND)
}

/// Converts a handler panic into an `AppError` response so it reaches the
/// classifier like any other failure.
pub fn panic_to_error(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    AppError::Internal(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::routing::{get, post};
    use axum::{middleware, Json, Router};
    use serde_json::Value;
    use tower::ServiceExt;
    use tower_http::catch_panic::CatchPanicLayer;

    type HttpRequest = axum::http::Request<Body>;

    fn app(mode: Mode) -> Router {
        Router::new()
            .route("/dup", get(|| async { Err::<(), _>(AppError::DuplicateKey { field: "email".into(), value: "a@b.co".into() }) }))
            .route("/boom", get(|| async { Err::<(), _>(AppError::Internal("disk on fire".into())) }))
            .route("/panic", get(|| async { if true { panic!("kaboom") } }))
            .route("/echo", post(|body: Result<Json<Value>, axum::extract::rejection::JsonRejection>| async move {
                let Json(v) = body.map_err(AppError::from)?;
                Ok::<_, AppError>(ApiResponse::data(v))
            }))
            .fallback(not_found)
            .layer(CatchPanicLayer::custom(panic_to_error))
            .layer(middleware::from_fn(malformed_body_filter))
            .layer(middleware::from_fn_with_state(ErrorPolicy::new(mode), error_classifier))
    }

    async fn send(app: Router, req: HttpRequest) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(uri: &str) -> HttpRequest { axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap() }

    #[tokio::test]
    async fn test_duplicate_key_in_production() {
        let (status, body) = send(app(Mode::Production), get_req("/dup")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Email already exists");
        assert!(body.get("stack").is_none());
    }

    #[tokio::test]
    async fn test_development_exposes_raw_error() {
        let (status, body) = send(app(Mode::Development), get_req("/boom")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "disk on fire");
        assert_eq!(body["error"], "disk on fire");
        assert!(body["stack"].is_string());
    }

    #[tokio::test]
    async fn test_production_hides_defects() {
        let (status, body) = send(app(Mode::Production), get_req("/boom")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Something went wrong");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_panic_reaches_classifier() {
        let (status, body) = send(app(Mode::Production), get_req("/panic")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Something went wrong");
    }

    #[tokio::test]
    async fn test_malformed_body_short_circuits_in_every_mode() {
        for mode in [Mode::Development, Mode::Production] {
            let req = axum::http::Request::builder()
                .method("POST")
                .uri("/echo")
                .header("content-type", "application/json")
                .body(Body::from("{\"a\":"))
                .unwrap();
            let (status, body) = send(app(mode), req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["message"], "Invalid JSON payload");
            assert!(body.get("stack").is_none());
        }
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, body) = send(app(Mode::Production), get_req("/foo/bar")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Route /foo/bar not found");
    }
}
