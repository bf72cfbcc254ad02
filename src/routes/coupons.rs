//! Coupon endpoints. Creating and listing coupons is admin-only.

use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use super::AppState;
use crate::auth::Admin;
use crate::domain::aggregates::Coupon;
use crate::error::{AppError, AppResult};
use crate::extract::{ApiPath, ValidatedJson};
use crate::response::ApiResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCouponRequest {
    #[validate(length(min = 1, max = 32, message = "Coupon code must be 1 to 32 characters"))]
    pub code: String,
    #[validate(range(min = 1, max = 100, message = "Discount must be between 1 and 100 percent"))]
    pub discount_percent: u8,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn create_coupon(
    _: Admin, State(s): State<AppState>, ValidatedJson(r): ValidatedJson<CreateCouponRequest>,
) -> AppResult<ApiResponse<Coupon>> {
    let coupon = Coupon::create(&r.code, r.discount_percent, r.expires_at);
    if coupon.code.is_empty() {
        return Err(AppError::Validation(vec!["Coupon code must be 1 to 32 characters".into()]));
    }
    s.store.insert_coupon(&coupon).await?;
    Ok(ApiResponse::data(coupon).with_message("Coupon created").with_status(StatusCode::CREATED))
}

pub async fn list_coupons(_: Admin, State(s): State<AppState>) -> AppResult<ApiResponse<Vec<Coupon>>> {
    Ok(ApiResponse::data(s.store.list_coupons().await?))
}

/// Public lookup; only coupons that can be redeemed right now are found.
pub async fn get_coupon(State(s): State<AppState>, ApiPath(code): ApiPath<String>) -> AppResult<ApiResponse<Coupon>> {
    let coupon = s.store.get_coupon(&code).await?
        .filter(|c| c.is_redeemable(Utc::now()))
        .ok_or_else(|| AppError::not_found("Coupon not found"))?;
    Ok(ApiResponse::data(coupon))
}
