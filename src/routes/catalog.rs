//! Product and category endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use crate::domain::aggregates::{Category, Product};
use crate::domain::value_objects::Sku;
use crate::error::{AppError, AppResult};
use crate::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::response::ApiResponse;
use crate::store::Page;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListParams {
    pub fn page(&self) -> Page { Page::new(self.page, self.per_page) }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Paginated<T> {
    pub fn new((items, total): (Vec<T>, i64), page: Page) -> Self {
        Self { items, total, page: page.page, per_page: page.per_page }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub sku: Option<String>,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Price must be a positive amount"))]
    pub price: i64,
    pub category_id: Option<Uuid>,
    #[validate(range(min = 0, message = "Inventory quantity cannot be negative"))]
    pub inventory_quantity: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

pub async fn list_products(State(s): State<AppState>, ApiQuery(p): ApiQuery<ListParams>) -> AppResult<ApiResponse<Paginated<Product>>> {
    let page = p.page();
    Ok(ApiResponse::data(Paginated::new(s.store.list_products(page).await?, page)))
}

pub async fn get_product(State(s): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> AppResult<ApiResponse<Product>> {
    let product = s.store.get_product(id).await?.ok_or_else(|| AppError::not_found("Product not found"))?;
    Ok(ApiResponse::data(product))
}

pub async fn create_product(State(s): State<AppState>, ValidatedJson(r): ValidatedJson<CreateProductRequest>) -> AppResult<ApiResponse<Product>> {
    let sku = match r.sku {
        Some(sku) => Sku::new(sku).map_err(|e| AppError::Validation(vec![e.to_string()]))?,
        None => Sku::generate(),
    };
    if let Some(category_id) = r.category_id {
        s.store.get_category(category_id).await?.ok_or_else(|| AppError::not_found("Category not found"))?;
    }
    let mut product = Product::create(sku, r.name.trim(), r.price);
    product.description = r.description;
    product.category_id = r.category_id;
    product.inventory_quantity = r.inventory_quantity.unwrap_or(0);
    s.store.insert_product(&product).await?;
    s.events.publish_all(product.take_events()).await;
    tracing::info!(product_id = %product.id, sku = %product.sku, "product created");
    Ok(ApiResponse::data(product).with_message("Product created").with_status(StatusCode::CREATED))
}

/// Soft delete: the product stays readable by id but leaves the listing.
pub async fn delete_product(State(s): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> AppResult<ApiResponse> {
    let mut product = s.store.get_product(id).await?
        .filter(Product::is_active)
        .ok_or_else(|| AppError::not_found("Product not found"))?;
    product.delete();
    s.store.update_product(&product).await?;
    s.events.publish_all(product.take_events()).await;
    Ok(ApiResponse::success("Product deleted"))
}

pub async fn list_categories(State(s): State<AppState>) -> AppResult<ApiResponse<Vec<Category>>> {
    Ok(ApiResponse::data(s.store.list_categories().await?))
}

pub async fn get_category(State(s): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> AppResult<ApiResponse<Category>> {
    let category = s.store.get_category(id).await?.ok_or_else(|| AppError::not_found("Category not found"))?;
    Ok(ApiResponse::data(category))
}

pub async fn create_category(State(s): State<AppState>, ValidatedJson(r): ValidatedJson<CreateCategoryRequest>) -> AppResult<ApiResponse<Category>> {
    if let Some(parent_id) = r.parent_id {
        s.store.get_category(parent_id).await?.ok_or_else(|| AppError::not_found("Parent category not found"))?;
    }
    let category = Category::create(r.name.trim(), r.description, r.parent_id);
    s.store.insert_category(&category).await?;
    Ok(ApiResponse::data(category).with_message("Category created").with_status(StatusCode::CREATED))
}
