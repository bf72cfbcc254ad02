//! Notification records for a customer email.

use axum::extract::State;
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::domain::aggregates::Notification;
use crate::error::{AppError, AppResult};
use crate::extract::{ApiPath, ApiQuery};
use crate::response::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct RecipientParams {
    pub email: String,
}

pub async fn list_notifications(State(s): State<AppState>, ApiQuery(p): ApiQuery<RecipientParams>) -> AppResult<ApiResponse<Vec<Notification>>> {
    Ok(ApiResponse::data(s.store.list_notifications(&p.email).await?))
}

pub async fn mark_read(State(s): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> AppResult<ApiResponse<Notification>> {
    let notification = s.store.mark_notification_read(id).await?.ok_or_else(|| AppError::not_found("Notification not found"))?;
    Ok(ApiResponse::data(notification))
}
