//! Persistence for the catalog and orders.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::analytics::pipeline::Pipeline;
use crate::domain::aggregates::{Address, Category, Coupon, Notification, Order, Product, User};
use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// 1-based page request, `per_page` capped at 100.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page: page.unwrap_or(1).max(1), per_page: per_page.unwrap_or(20).clamp(1, 100) }
    }

    pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.per_page) }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_product(&self, product: &Product) -> AppResult<()>;
    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>>;
    /// Active products, newest first, with the total active count.
    async fn list_products(&self, page: Page) -> AppResult<(Vec<Product>, i64)>;
    async fn update_product(&self, product: &Product) -> AppResult<()>;

    async fn insert_category(&self, category: &Category) -> AppResult<()>;
    async fn get_category(&self, id: Uuid) -> AppResult<Option<Category>>;
    async fn list_categories(&self) -> AppResult<Vec<Category>>;

    async fn insert_order(&self, order: &Order) -> AppResult<()>;
    async fn get_order(&self, id: Uuid) -> AppResult<Option<Order>>;
    /// Orders newest first, with the total count.
    async fn list_orders(&self, page: Page) -> AppResult<(Vec<Order>, i64)>;
    async fn update_order_status(&self, order: &Order) -> AppResult<()>;

    /// Runs `pipeline` over the order collection and returns its result rows.
    async fn aggregate_orders(&self, pipeline: &Pipeline) -> AppResult<Vec<Value>>;

    async fn insert_user(&self, user: &User) -> AppResult<()>;
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn list_users(&self, page: Page) -> AppResult<(Vec<User>, i64)>;
    /// A default address clears the flag on the user's other addresses.
    async fn insert_address(&self, address: &Address) -> AppResult<()>;
    /// Default address first, then oldest first.
    async fn list_addresses(&self, user_id: Uuid) -> AppResult<Vec<Address>>;

    async fn insert_coupon(&self, coupon: &Coupon) -> AppResult<()>;
    /// Looks up by normalized code.
    async fn get_coupon(&self, code: &str) -> AppResult<Option<Coupon>>;
    async fn list_coupons(&self) -> AppResult<Vec<Coupon>>;

    async fn insert_notification(&self, notification: &Notification) -> AppResult<()>;
    /// Newest first.
    async fn list_notifications(&self, recipient: &str) -> AppResult<Vec<Notification>>;
    /// Returns the updated record, `None` when no notification has that id.
    async fn mark_notification_read(&self, id: Uuid) -> AppResult<Option<Notification>>;
}
