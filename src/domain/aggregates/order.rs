//! Order Aggregate

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use super::coupon::Coupon;
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_email: String,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    /// Amount payable after `discount`.
    pub total: i64,
    pub discount: i64,
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem { pub product_id: Uuid, pub name: String, pub sku: String, pub quantity: i32, pub unit_price: i64 }

impl LineItem {
    /// `None` when the product does not fit in an `i64`.
    pub fn line_total(&self) -> Option<i64> { self.unit_price.checked_mul(i64::from(self.quantity)) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Returned }

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped,
        Self::Delivered, Self::Cancelled, Self::Returned,
    ];

    /// Orders whose items have left (or are about to leave) inventory.
    pub const FULFILLED_OR_IN_FLIGHT: [OrderStatus; 4] = [Self::Confirmed, Self::Processing, Self::Shipped, Self::Delivered];

    /// Orders whose items went back into inventory.
    pub const RESTOCKED: [OrderStatus; 2] = [Self::Cancelled, Self::Returned];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled)
                | (Confirmed, Processing) | (Confirmed, Cancelled)
                | (Processing, Shipped) | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Delivered, Returned)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|status| status.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

impl Order {
    pub fn create(customer_email: impl Into<String>, items: Vec<LineItem>) -> Result<Self, OrderError> {
        Self::create_with_coupon(customer_email, items, None)
    }

    /// New pending order; a redeemable `coupon` is taken off the subtotal.
    pub fn create_with_coupon(customer_email: impl Into<String>, items: Vec<LineItem>, coupon: Option<&Coupon>) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        let subtotal = items.iter().try_fold(0i64, |sum, item| item.line_total().and_then(|t| sum.checked_add(t)))
            .ok_or(OrderError::TotalOverflow)?;
        let now = Utc::now();
        let discount = match coupon {
            Some(c) if c.is_redeemable(now) => c.discount_for(subtotal),
            Some(c) => return Err(OrderError::CouponNotRedeemable(c.code.clone())),
            None => 0,
        };
        let mut order = Self {
            id: Uuid::now_v7(),
            order_number: generate_order_number(),
            customer_email: customer_email.into(),
            status: OrderStatus::Pending,
            total: subtotal - discount,
            discount,
            coupon_code: coupon.map(|c| c.code.clone()),
            items,
            created_at: now,
            updated_at: now,
            events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Created {
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer_email: order.customer_email.clone(),
            total: order.total,
            item_count: order.items.len(),
        }));
        Ok(order)
    }

    /// Rebuilds an order loaded from storage; no events are raised.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid, order_number: String, customer_email: String, status: OrderStatus,
        items: Vec<LineItem>, total: i64, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        Self { id, order_number, customer_email, status, items, total, discount: 0, coupon_code: None, created_at, updated_at, events: vec![] }
    }

    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        self.status = next;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, order_number: self.order_number.clone(), from, to: next }));
        Ok(())
    }

    /// Document form used by the aggregation executor.
    pub fn to_document(&self) -> Value {
        let items: Vec<Value> = self.items.iter()
            .map(|i| json!({ "product": i.product_id.to_string(), "quantity": i.quantity, "price": i.unit_price }))
            .collect();
        json!({
            "_id": self.id.to_string(),
            "orderNumber": self.order_number,
            "status": self.status.as_str(),
            "createdAt": { "$date": self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true) },
            "items": items,
        })
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order must contain at least one item")]
    NoItems,
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
    #[error("Order total is too large")]
    TotalOverflow,
    #[error("Coupon {0} is not valid")]
    CouponNotRedeemable(String),
}

/// Random `ORD-########` number.
pub fn generate_order_number() -> String { format!("ORD-{:08}", rand::random::<u32>() % 100_000_000) }
