//! Postgres-backed store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Page, Store};
use crate::analytics::eval;
use crate::analytics::pipeline::Pipeline;
use crate::domain::aggregates::coupon::normalize_code;
use crate::domain::aggregates::{Address, Category, Coupon, LineItem, Notification, Order, Product, ProductStatus, User};
use crate::domain::value_objects::Sku;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self { Self { db } }

    /// Attaches line items to order rows, keeping the row order.
    async fn hydrate(&self, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT order_id, product_id, name, sku, quantity, unit_price FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;
        let mut by_order: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(LineItem {
                product_id: item.product_id,
                name: item.name,
                sku: item.sku,
                quantity: item.quantity,
                unit_price: item.unit_price,
            });
        }
        rows.into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, sku: String, name: String, description: Option<String>, price: i64, category_id: Option<Uuid>,
    inventory_quantity: i32, status: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;
    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        let sku = Sku::new(r.sku).map_err(|e| AppError::Cast(e.to_string()))?;
        Ok(Product::restore(
            r.id, sku, r.name, r.description, r.price, r.category_id,
            r.inventory_quantity, ProductStatus::parse(&r.status), r.created_at, r.updated_at,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow { id: Uuid, name: String, slug: String, description: Option<String>, parent_id: Option<Uuid>, created_at: DateTime<Utc> }

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Category { id: r.id, name: r.name, slug: r.slug, description: r.description, parent_id: r.parent_id, created_at: r.created_at }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, order_number: String, customer_email: String, status: String, total: i64,
    discount: i64, coupon_code: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> AppResult<Order> {
        let status = self.status.parse().map_err(|e: crate::domain::aggregates::OrderError| AppError::Cast(e.to_string()))?;
        let mut order = Order::restore(self.id, self.order_number, self.customer_email, status, items, self.total, self.created_at, self.updated_at);
        order.discount = self.discount;
        order.coupon_code = self.coupon_code;
        Ok(order)
    }
}

#[derive(sqlx::FromRow)]
struct UserRow { id: Uuid, name: String, email: String, role: String, created_at: DateTime<Utc> }

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self { User { id: r.id, name: r.name, email: r.email, role: r.role, created_at: r.created_at } }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: Uuid, user_id: Uuid, line1: String, line2: Option<String>, city: String, postal_code: String,
    country: String, is_default: bool, created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(r: AddressRow) -> Self {
        Address {
            id: r.id, user_id: r.user_id, line1: r.line1, line2: r.line2, city: r.city, postal_code: r.postal_code,
            country: r.country, is_default: r.is_default, created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow { id: Uuid, code: String, discount_percent: i16, expires_at: Option<DateTime<Utc>>, active: bool, created_at: DateTime<Utc> }

impl TryFrom<CouponRow> for Coupon {
    type Error = AppError;
    fn try_from(r: CouponRow) -> Result<Self, Self::Error> {
        let discount_percent = u8::try_from(r.discount_percent).map_err(|e| AppError::Cast(format!("discount_percent: {e}")))?;
        Ok(Coupon { id: r.id, code: r.code, discount_percent, expires_at: r.expires_at, active: r.active, created_at: r.created_at })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow { id: Uuid, recipient: String, title: String, message: String, read: bool, created_at: DateTime<Utc> }

impl From<NotificationRow> for Notification {
    fn from(r: NotificationRow) -> Self {
        Notification { id: r.id, recipient: r.recipient, title: r.title, message: r.message, read: r.read, created_at: r.created_at }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow { order_id: Uuid, product_id: Uuid, name: String, sku: String, quantity: i32, unit_price: i64 }

const PRODUCT_COLUMNS: &str = "id, sku, name, description, price, category_id, inventory_quantity, status, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, order_number, customer_email, status, total, discount, coupon_code, created_at, updated_at";
const ADDRESS_COLUMNS: &str = "id, user_id, line1, line2, city, postal_code, country, is_default, created_at";
const COUPON_COLUMNS: &str = "id, code, discount_percent, expires_at, active, created_at";
const NOTIFICATION_COLUMNS: &str = "id, recipient, title, message, read, created_at";

#[async_trait]
impl Store for PgStore {
    async fn insert_product(&self, p: &Product) -> AppResult<()> {
        sqlx::query("INSERT INTO products (id, sku, name, description, price, category_id, inventory_quantity, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)")
            .bind(p.id).bind(p.sku.as_str()).bind(&p.name).bind(&p.description).bind(p.price).bind(p.category_id)
            .bind(p.inventory_quantity).bind(p.status.as_str()).bind(p.created_at).bind(p.updated_at)
            .execute(&self.db).await?;
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id).fetch_optional(&self.db).await?;
        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self, page: Page) -> AppResult<(Vec<Product>, i64)> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE status = 'active' ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"))
            .bind(i64::from(page.per_page)).bind(page.offset() as i64).fetch_all(&self.db).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE status = 'active'").fetch_one(&self.db).await?;
        let products = rows.into_iter().map(Product::try_from).collect::<AppResult<Vec<_>>>()?;
        Ok((products, total.0))
    }

    async fn update_product(&self, p: &Product) -> AppResult<()> {
        let result = sqlx::query("UPDATE products SET name = $2, description = $3, price = $4, category_id = $5, inventory_quantity = $6, status = $7, updated_at = $8 WHERE id = $1")
            .bind(p.id).bind(&p.name).bind(&p.description).bind(p.price).bind(p.category_id)
            .bind(p.inventory_quantity).bind(p.status.as_str()).bind(p.updated_at)
            .execute(&self.db).await?;
        if result.rows_affected() == 0 { return Err(AppError::not_found("Product not found")); }
        Ok(())
    }

    async fn insert_category(&self, c: &Category) -> AppResult<()> {
        sqlx::query("INSERT INTO categories (id, name, slug, description, parent_id, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(c.id).bind(&c.name).bind(&c.slug).bind(&c.description).bind(c.parent_id).bind(c.created_at)
            .execute(&self.db).await?;
        Ok(())
    }

    async fn get_category(&self, id: Uuid) -> AppResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT id, name, slug, description, parent_id, created_at FROM categories WHERE id = $1")
            .bind(id).fetch_optional(&self.db).await?;
        Ok(row.map(Category::from))
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT id, name, slug, description, parent_id, created_at FROM categories ORDER BY name")
            .fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn insert_order(&self, o: &Order) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("INSERT INTO orders (id, order_number, customer_email, status, total, discount, coupon_code, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
            .bind(o.id).bind(&o.order_number).bind(&o.customer_email).bind(o.status.as_str()).bind(o.total)
            .bind(o.discount).bind(&o.coupon_code).bind(o.created_at).bind(o.updated_at)
            .execute(&mut *tx).await?;
        for (position, item) in o.items.iter().enumerate() {
            sqlx::query("INSERT INTO order_items (id, order_id, product_id, position, name, sku, quantity, unit_price) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
                .bind(Uuid::now_v7()).bind(o.id).bind(item.product_id).bind(position as i32).bind(&item.name).bind(&item.sku)
                .bind(item.quantity).bind(item.unit_price)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id).fetch_optional(&self.db).await?;
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, page: Page) -> AppResult<(Vec<Order>, i64)> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"))
            .bind(i64::from(page.per_page)).bind(page.offset() as i64).fetch_all(&self.db).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(&self.db).await?;
        Ok((self.hydrate(rows).await?, total.0))
    }

    async fn update_order_status(&self, o: &Order) -> AppResult<()> {
        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(o.id).bind(o.status.as_str()).bind(o.updated_at)
            .execute(&self.db).await?;
        if result.rows_affected() == 0 { return Err(AppError::not_found("Order not found")); }
        Ok(())
    }

    async fn aggregate_orders(&self, pipeline: &Pipeline) -> AppResult<Vec<Value>> {
        let anchor = pipeline.product_anchor().and_then(|id| Uuid::parse_str(id).ok());
        let rows = match anchor {
            Some(product_id) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders o WHERE EXISTS (SELECT 1 FROM order_items i WHERE i.order_id = o.id AND i.product_id = $1)"
                ))
                .bind(product_id).fetch_all(&self.db).await?
            }
            None => sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders")).fetch_all(&self.db).await?,
        };
        let orders = self.hydrate(rows).await?;
        tracing::debug!(candidates = orders.len(), anchored = anchor.is_some(), "running aggregation");
        Ok(eval::run(pipeline, orders.iter().map(Order::to_document).collect()))
    }

    async fn insert_user(&self, u: &User) -> AppResult<()> {
        sqlx::query("INSERT INTO users (id, name, email, role, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(u.id).bind(&u.name).bind(&u.email).bind(&u.role).bind(u.created_at)
            .execute(&self.db).await?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, email, role, created_at FROM users WHERE id = $1")
            .bind(id).fetch_optional(&self.db).await?;
        Ok(row.map(User::from))
    }

    async fn list_users(&self, page: Page) -> AppResult<(Vec<User>, i64)> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT id, name, email, role, created_at FROM users ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2")
            .bind(i64::from(page.per_page)).bind(page.offset() as i64).fetch_all(&self.db).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(&self.db).await?;
        Ok((rows.into_iter().map(User::from).collect(), total.0))
    }

    async fn insert_address(&self, a: &Address) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        if a.is_default {
            sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1").bind(a.user_id).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO addresses (id, user_id, line1, line2, city, postal_code, country, is_default, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
            .bind(a.id).bind(a.user_id).bind(&a.line1).bind(&a.line2).bind(&a.city).bind(&a.postal_code)
            .bind(&a.country).bind(a.is_default).bind(a.created_at)
            .execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_addresses(&self, user_id: Uuid) -> AppResult<Vec<Address>> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at"))
            .bind(user_id).fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn insert_coupon(&self, c: &Coupon) -> AppResult<()> {
        sqlx::query("INSERT INTO coupons (id, code, discount_percent, expires_at, active, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(c.id).bind(&c.code).bind(i16::from(c.discount_percent)).bind(c.expires_at).bind(c.active).bind(c.created_at)
            .execute(&self.db).await?;
        Ok(())
    }

    async fn get_coupon(&self, code: &str) -> AppResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"))
            .bind(normalize_code(code)).fetch_optional(&self.db).await?;
        row.map(Coupon::try_from).transpose()
    }

    async fn list_coupons(&self) -> AppResult<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY code"))
            .fetch_all(&self.db).await?;
        rows.into_iter().map(Coupon::try_from).collect()
    }

    async fn insert_notification(&self, n: &Notification) -> AppResult<()> {
        sqlx::query("INSERT INTO notifications (id, recipient, title, message, read, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(n.id).bind(&n.recipient).bind(&n.title).bind(&n.message).bind(n.read).bind(n.created_at)
            .execute(&self.db).await?;
        Ok(())
    }

    async fn list_notifications(&self, recipient: &str) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE recipient = $1 ORDER BY created_at DESC, id DESC"))
            .bind(recipient.trim().to_lowercase()).fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_notification_read(&self, id: Uuid) -> AppResult<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!("UPDATE notifications SET read = TRUE WHERE id = $1 RETURNING {NOTIFICATION_COLUMNS}"))
            .bind(id).fetch_optional(&self.db).await?;
        Ok(row.map(Notification::from))
    }
}
