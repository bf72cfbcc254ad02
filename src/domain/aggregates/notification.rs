//! Notification records kept for customers

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::order::Order;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(recipient: &str, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            recipient: recipient.trim().to_lowercase(),
            title: title.into(),
            message: message.into(),
            read: false,
            created_at: Utc::now(),
        }
    }

    pub fn order_placed(order: &Order) -> Self {
        Self::new(&order.customer_email, "Order placed", format!("Your order {} has been placed", order.order_number))
    }

    pub fn order_status_changed(order: &Order) -> Self {
        Self::new(&order.customer_email, "Order updated", format!("Your order {} is now {}", order.order_number, order.status))
    }
}
