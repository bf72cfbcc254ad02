//! Report windows, result rows and the queries behind the admin analytics routes.

use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::builders;
use crate::error::{AppError, AppResult};
use crate::store::Store;

/// Date boundaries relative to `now`, computed once per request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportWindow {
    pub now: DateTime<Utc>,
    pub one_month_ago: DateTime<Utc>,
    pub two_months_ago: DateTime<Utc>,
    pub four_months_ago: DateTime<Utc>,
}

/// Lower bound for every window; earlier instants have no RFC 3339 form.
fn earliest() -> DateTime<Utc> { Utc.timestamp_opt(0, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC) }

impl ReportWindow {
    pub fn ending_at(now: DateTime<Utc>) -> Self {
        let back = |n| now.checked_sub_months(Months::new(n)).map_or(earliest(), |d| d.max(earliest()));
        Self { now, one_month_ago: back(1), two_months_ago: back(2), four_months_ago: back(4) }
    }

    /// Saturates at the Unix epoch.
    pub fn days_ago(&self, days: u32) -> DateTime<Utc> {
        self.now.checked_sub_signed(Duration::days(i64::from(days))).map_or(earliest(), |d| d.max(earliest()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesTotals {
    #[serde(default)]
    pub total_revenue: i64,
    #[serde(default)]
    pub total_quantity: i64,
    #[serde(default)]
    pub total_orders: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueTotal {
    #[serde(default)]
    pub total_revenue: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month: String,
    pub revenue: i64,
    pub quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub date: String,
    pub action: String,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct CountRow {
    count: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct StockHistoryFacet {
    #[serde(default)]
    history: Vec<StockMovement>,
    #[serde(default)]
    total: Vec<CountRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSalesReport {
    pub product_id: Uuid,
    #[serde(flatten)]
    pub totals: SalesTotals,
    pub monthly_trend: Vec<MonthlyPoint>,
    pub last_month_revenue: i64,
    pub previous_month_revenue: i64,
    pub growth_percent: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StockHistoryPage {
    pub history: Vec<StockMovement>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

/// First row decoded as `T`, or `T::default()` when the pipeline returned nothing.
pub fn first_or_default<T: DeserializeOwned + Default>(rows: Vec<Value>) -> AppResult<T> {
    match rows.into_iter().next() {
        Some(row) => Ok(serde_json::from_value(row)?),
        None => Ok(T::default()),
    }
}

pub fn decode_all<T: DeserializeOwned>(rows: Vec<Value>) -> AppResult<Vec<T>> {
    rows.into_iter().map(|row| serde_json::from_value(row).map_err(AppError::from)).collect()
}

/// Month-over-month change in percent, rounded to two decimals.
pub fn growth_percent(last: i64, previous: i64) -> f64 {
    if previous == 0 {
        return if last > 0 { 100.0 } else { 0.0 };
    }
    let pct = (last as f64 - previous as f64) / previous as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

pub async fn product_sales_report(store: &dyn Store, product_id: Uuid, window: ReportWindow) -> AppResult<ProductSalesReport> {
    let total = builders::total_sales(product_id);
    let trend = builders::monthly_trend(product_id, window.four_months_ago);
    let last = builders::last_month_revenue(product_id, window.one_month_ago);
    let previous = builders::previous_month_revenue(product_id, window.two_months_ago, window.one_month_ago);

    let (total, trend, last, previous) = tokio::try_join!(
        store.aggregate_orders(&total),
        store.aggregate_orders(&trend),
        store.aggregate_orders(&last),
        store.aggregate_orders(&previous),
    )?;

    let last: RevenueTotal = first_or_default(last)?;
    let previous: RevenueTotal = first_or_default(previous)?;
    Ok(ProductSalesReport {
        product_id,
        totals: first_or_default(total)?,
        monthly_trend: decode_all(trend)?,
        last_month_revenue: last.total_revenue,
        previous_month_revenue: previous.total_revenue,
        growth_percent: growth_percent(last.total_revenue, previous.total_revenue),
    })
}

pub async fn stock_history(store: &dyn Store, product_id: Uuid, since: DateTime<Utc>) -> AppResult<Vec<StockMovement>> {
    decode_all(store.aggregate_orders(&builders::stock_history(product_id, since)).await?)
}

/// `page` is 1-based.
pub async fn stock_history_page(
    store: &dyn Store, product_id: Uuid, since: DateTime<Utc>, page: u64, limit: u64,
) -> AppResult<StockHistoryPage> {
    let page = page.max(1);
    let limit = limit.max(1);
    let rows = store.aggregate_orders(&builders::stock_history_page(product_id, since, (page - 1).saturating_mul(limit), limit)).await?;
    let facet: StockHistoryFacet = first_or_default(rows)?;
    let total = facet.total.first().map_or(0, |c| c.count);
    Ok(StockHistoryPage { history: facet.history, total, page, limit, pages: total.div_ceil(limit) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{LineItem, Order, OrderStatus};
    use crate::store::MemoryStore;

    async fn seed(store: &MemoryStore, product: Uuid, status: OrderStatus, created: DateTime<Utc>, quantity: i32) {
        let item = LineItem { product_id: product, name: "W".into(), sku: "W".into(), quantity, unit_price: 100 };
        let n = rand::random::<u32>();
        let order = Order::restore(Uuid::new_v4(), format!("ORD-{n:08}"), "c@example.com".into(), status, vec![item], 0, created, created);
        store.insert_order(&order).await.unwrap();
    }

    #[test]
    fn test_window_boundaries() {
        let now = Utc.with_ymd_and_hms(2025, 6, 30, 8, 0, 0).unwrap();
        let w = ReportWindow::ending_at(now);
        assert_eq!(w.one_month_ago, Utc.with_ymd_and_hms(2025, 5, 30, 8, 0, 0).unwrap());
        assert_eq!(w.two_months_ago, Utc.with_ymd_and_hms(2025, 4, 30, 8, 0, 0).unwrap());
        assert_eq!(w.four_months_ago, Utc.with_ymd_and_hms(2025, 2, 28, 8, 0, 0).unwrap());
        assert_eq!(w.days_ago(30), Utc.with_ymd_and_hms(2025, 5, 31, 8, 0, 0).unwrap());
        assert_eq!(w.days_ago(u32::MAX), Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_growth_percent() {
        assert_eq!(growth_percent(150, 100), 50.0);
        assert_eq!(growth_percent(100, 300), -66.67);
        assert_eq!(growth_percent(10, 0), 100.0);
        assert_eq!(growth_percent(0, 0), 0.0);
    }

    #[test]
    fn test_empty_results_default_to_zero() {
        let totals: SalesTotals = first_or_default(vec![]).unwrap();
        assert_eq!(totals, SalesTotals::default());
        assert_eq!(totals.total_revenue, 0);
    }

    #[tokio::test]
    async fn test_report_for_product_without_orders() {
        let store = MemoryStore::new();
        let report = product_sales_report(&store, Uuid::new_v4(), ReportWindow::ending_at(Utc::now())).await.unwrap();
        assert_eq!(report.totals, SalesTotals::default());
        assert!(report.monthly_trend.is_empty());
        assert_eq!(report.growth_percent, 0.0);
    }

    #[tokio::test]
    async fn test_report_combines_pipelines() {
        let store = MemoryStore::new();
        let p = Uuid::new_v4();
        let now = Utc::now();
        seed(&store, p, OrderStatus::Delivered, now - Duration::days(3), 3).await;
        seed(&store, p, OrderStatus::Delivered, now - Duration::days(40), 2).await;
        seed(&store, p, OrderStatus::Cancelled, now - Duration::days(2), 9).await;
        let report = product_sales_report(&store, p, ReportWindow::ending_at(now)).await.unwrap();
        assert_eq!(report.totals, SalesTotals { total_revenue: 500, total_quantity: 5, total_orders: 2 });
        assert_eq!(report.last_month_revenue, 300);
        assert_eq!(report.previous_month_revenue, 200);
        assert_eq!(report.growth_percent, 50.0);
        assert_eq!(report.monthly_trend.iter().map(|m| m.quantity).sum::<i64>(), 5);
    }

    #[tokio::test]
    async fn test_history_page_reports_total_regardless_of_limit() {
        let store = MemoryStore::new();
        let p = Uuid::new_v4();
        let now = Utc::now();
        for d in 0..5 {
            seed(&store, p, OrderStatus::Returned, now - Duration::days(d), 1).await;
        }
        let page = stock_history_page(&store, p, now - Duration::days(30), 2, 2).await.unwrap();
        assert_eq!(page.history.len(), 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.pages, 3);
        assert!(page.history.iter().all(|m| m.quantity == 1 && m.action == builders::STOCK_ADDED));

        let empty = stock_history_page(&store, Uuid::new_v4(), now - Duration::days(30), 1, 10).await.unwrap();
        assert_eq!((empty.total, empty.pages), (0, 0));

        let far = stock_history_page(&store, p, now - Duration::days(30), u64::MAX, 100).await.unwrap();
        assert!(far.history.is_empty());
        assert_eq!((far.total, far.page), (5, u64::MAX));
    }

    #[tokio::test]
    async fn test_stock_history_summary() {
        let store = MemoryStore::new();
        let p = Uuid::new_v4();
        let now = Utc::now();
        seed(&store, p, OrderStatus::Shipped, now - Duration::days(1), 4).await;
        seed(&store, p, OrderStatus::Shipped, now - Duration::days(90), 4).await;
        let rows = stock_history(&store, p, now - Duration::days(30)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, -4);
        assert_eq!(rows[0].action, builders::STOCK_REDUCED);
        assert!(rows[0].order_number.is_none());
    }
}
