//! Admin analytics endpoints.

use axum::extract::State;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::analytics::report::{self, ProductSalesReport, ReportWindow, StockHistoryPage, StockMovement};
use crate::auth::Admin;
use crate::error::{AppError, AppResult};
use crate::extract::{ApiPath, ApiQuery};
use crate::response::ApiResponse;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub days: Option<u32>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl HistoryParams {
    fn days(&self) -> u32 { self.days.unwrap_or(30) }
    fn page(&self) -> u64 { self.page.unwrap_or(1).max(1) }
    fn limit(&self) -> u64 { self.limit.unwrap_or(10).clamp(1, 100) }
}

async fn ensure_product(s: &AppState, id: Uuid) -> AppResult<()> {
    s.store.get_product(id).await?.ok_or_else(|| AppError::not_found("Product not found"))?;
    Ok(())
}

pub async fn product_sales(
    Admin(claims): Admin, State(s): State<AppState>, ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<ProductSalesReport>> {
    ensure_product(&s, id).await?;
    tracing::debug!(admin = %claims.sub, product_id = %id, "sales report");
    let report = report::product_sales_report(s.store.as_ref(), id, ReportWindow::ending_at(Utc::now())).await?;
    Ok(ApiResponse::data(report))
}

pub async fn stock_history(
    _: Admin, State(s): State<AppState>, ApiPath(id): ApiPath<Uuid>, ApiQuery(p): ApiQuery<HistoryParams>,
) -> AppResult<ApiResponse<Vec<StockMovement>>> {
    ensure_product(&s, id).await?;
    let since = ReportWindow::ending_at(Utc::now()).days_ago(p.days());
    Ok(ApiResponse::data(report::stock_history(s.store.as_ref(), id, since).await?))
}

pub async fn stock_history_paged(
    _: Admin, State(s): State<AppState>, ApiPath(id): ApiPath<Uuid>, ApiQuery(p): ApiQuery<HistoryParams>,
) -> AppResult<ApiResponse<StockHistoryPage>> {
    ensure_product(&s, id).await?;
    let since = ReportWindow::ending_at(Utc::now()).days_ago(p.days());
    let page = report::stock_history_page(s.store.as_ref(), id, since, p.page(), p.limit()).await?;
    Ok(ApiResponse::data(page))
}
