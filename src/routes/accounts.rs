//! Customer account and address endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::catalog::{ListParams, Paginated};
use super::AppState;
use crate::domain::aggregates::{Address, User};
use crate::error::{AppError, AppResult};
use crate::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::response::ApiResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAddressRequest {
    #[validate(length(min = 1, message = "Address line is required"))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(equal = 2, message = "Country must be a two-letter code"))]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

pub async fn create_user(State(s): State<AppState>, ValidatedJson(r): ValidatedJson<CreateUserRequest>) -> AppResult<ApiResponse<User>> {
    let user = User::create(r.name.trim(), &r.email);
    s.store.insert_user(&user).await?;
    Ok(ApiResponse::data(user).with_message("User created").with_status(StatusCode::CREATED))
}

pub async fn list_users(State(s): State<AppState>, ApiQuery(p): ApiQuery<ListParams>) -> AppResult<ApiResponse<Paginated<User>>> {
    let page = p.page();
    Ok(ApiResponse::data(Paginated::new(s.store.list_users(page).await?, page)))
}

pub async fn get_user(State(s): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> AppResult<ApiResponse<User>> {
    Ok(ApiResponse::data(find_user(&s, id).await?))
}

async fn find_user(s: &AppState, id: Uuid) -> AppResult<User> {
    s.store.get_user(id).await?.ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn list_addresses(State(s): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> AppResult<ApiResponse<Vec<Address>>> {
    let user = find_user(&s, id).await?;
    Ok(ApiResponse::data(s.store.list_addresses(user.id).await?))
}

/// A user's first address becomes the default.
pub async fn add_address(
    State(s): State<AppState>, ApiPath(id): ApiPath<Uuid>, ValidatedJson(r): ValidatedJson<CreateAddressRequest>,
) -> AppResult<ApiResponse<Address>> {
    let user = find_user(&s, id).await?;
    let is_default = r.is_default || s.store.list_addresses(user.id).await?.is_empty();
    let address = Address::create(user.id, r.line1, r.line2, r.city, r.postal_code, r.country, is_default);
    s.store.insert_address(&address).await?;
    Ok(ApiResponse::data(address).with_message("Address added").with_status(StatusCode::CREATED))
}
