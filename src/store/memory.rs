//! In-process store used for tests and when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Page, Store};
use crate::analytics::eval;
use crate::analytics::pipeline::Pipeline;
use crate::domain::aggregates::{Address, Category, Coupon, Notification, Order, Product, User};
use crate::domain::aggregates::coupon::normalize_code;
use crate::error::{AppError, AppResult};

#[derive(Default)]
pub struct MemoryStore {
    products: RwLock<HashMap<Uuid, Product>>,
    categories: RwLock<HashMap<Uuid, Category>>,
    orders: RwLock<HashMap<Uuid, Order>>,
    users: RwLock<HashMap<Uuid, User>>,
    addresses: RwLock<Vec<Address>>,
    coupons: RwLock<HashMap<String, Coupon>>,
    notifications: RwLock<Vec<Notification>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn paginate<T: Clone>(mut rows: Vec<T>, page: Page, newest_first: impl Fn(&T, &T) -> std::cmp::Ordering) -> (Vec<T>, i64) {
    rows.sort_by(newest_first);
    let total = rows.len() as i64;
    let items = rows.into_iter().skip(page.offset() as usize).take(page.per_page as usize).collect();
    (items, total)
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_product(&self, product: &Product) -> AppResult<()> {
        let mut products = self.products.write().await;
        if products.values().any(|p| p.sku == product.sku) {
            return Err(AppError::DuplicateKey { field: "sku".into(), value: product.sku.to_string() });
        }
        products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn list_products(&self, page: Page) -> AppResult<(Vec<Product>, i64)> {
        let active: Vec<Product> = self.products.read().await.values().filter(|p| p.is_active()).cloned().collect();
        Ok(paginate(active, page, |a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))))
    }

    async fn update_product(&self, product: &Product) -> AppResult<()> {
        match self.products.write().await.get_mut(&product.id) {
            Some(slot) => { *slot = product.clone(); Ok(()) }
            None => Err(AppError::not_found("Product not found")),
        }
    }

    async fn insert_category(&self, category: &Category) -> AppResult<()> {
        let mut categories = self.categories.write().await;
        if categories.values().any(|c| c.slug == category.slug) {
            return Err(AppError::DuplicateKey { field: "slug".into(), value: category.slug.clone() });
        }
        categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn get_category(&self, id: Uuid) -> AppResult<Option<Category>> {
        Ok(self.categories.read().await.get(&id).cloned())
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let mut all: Vec<Category> = self.categories.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        let mut orders = self.orders.write().await;
        if orders.values().any(|o| o.order_number == order.order_number) {
            return Err(AppError::DuplicateKey { field: "order_number".into(), value: order.order_number.clone() });
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_orders(&self, page: Page) -> AppResult<(Vec<Order>, i64)> {
        let all: Vec<Order> = self.orders.read().await.values().cloned().collect();
        Ok(paginate(all, page, |a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))))
    }

    async fn update_order_status(&self, order: &Order) -> AppResult<()> {
        match self.orders.write().await.get_mut(&order.id) {
            Some(slot) => {
                slot.status = order.status;
                slot.updated_at = order.updated_at;
                Ok(())
            }
            None => Err(AppError::not_found("Order not found")),
        }
    }

    async fn aggregate_orders(&self, pipeline: &Pipeline) -> AppResult<Vec<Value>> {
        let docs = self.orders.read().await.values().map(Order::to_document).collect();
        Ok(eval::run(pipeline, docs))
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::DuplicateKey { field: "email".into(), value: user.email.clone() });
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list_users(&self, page: Page) -> AppResult<(Vec<User>, i64)> {
        let all: Vec<User> = self.users.read().await.values().cloned().collect();
        Ok(paginate(all, page, |a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))))
    }

    async fn insert_address(&self, address: &Address) -> AppResult<()> {
        let mut addresses = self.addresses.write().await;
        if address.is_default {
            addresses.iter_mut().filter(|a| a.user_id == address.user_id).for_each(|a| a.is_default = false);
        }
        addresses.push(address.clone());
        Ok(())
    }

    async fn list_addresses(&self, user_id: Uuid) -> AppResult<Vec<Address>> {
        let mut mine: Vec<Address> = self.addresses.read().await.iter().filter(|a| a.user_id == user_id).cloned().collect();
        mine.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(a.created_at.cmp(&b.created_at)));
        Ok(mine)
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> AppResult<()> {
        let mut coupons = self.coupons.write().await;
        if coupons.contains_key(&coupon.code) {
            return Err(AppError::DuplicateKey { field: "code".into(), value: coupon.code.clone() });
        }
        coupons.insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }

    async fn get_coupon(&self, code: &str) -> AppResult<Option<Coupon>> {
        Ok(self.coupons.read().await.get(&normalize_code(code)).cloned())
    }

    async fn list_coupons(&self) -> AppResult<Vec<Coupon>> {
        let mut all: Vec<Coupon> = self.coupons.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(all)
    }

    async fn insert_notification(&self, notification: &Notification) -> AppResult<()> {
        self.notifications.write().await.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(&self, recipient: &str) -> AppResult<Vec<Notification>> {
        let recipient = recipient.trim().to_lowercase();
        let mut mine: Vec<Notification> =
            self.notifications.read().await.iter().filter(|n| n.recipient == recipient).cloned().collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(mine)
    }

    async fn mark_notification_read(&self, id: Uuid) -> AppResult<Option<Notification>> {
        let mut notifications = self.notifications.write().await;
        Ok(notifications.iter_mut().find(|n| n.id == id).map(|n| {
            n.read = true;
            n.clone()
        }))
    }
}
