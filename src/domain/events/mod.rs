//! Domain events
use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::Sku;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, sku: Sku },
    Deleted { product_id: Uuid },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, order_number: String, customer_email: String, total: i64, item_count: usize },
    StatusChanged { order_id: Uuid, order_number: String, from: OrderStatus, to: OrderStatus },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::Created { .. }) => "ecommerce.products.created",
            Self::Product(ProductEvent::Deleted { .. }) => "ecommerce.products.deleted",
            Self::Order(OrderEvent::Created { .. }) => "ecommerce.orders.created",
            Self::Order(OrderEvent::StatusChanged { .. }) => "ecommerce.orders.status_changed",
        }
    }
}
