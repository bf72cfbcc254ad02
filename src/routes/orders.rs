//! Order endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::catalog::{ListParams, Paginated};
use super::AppState;
use crate::domain::aggregates::{LineItem, Notification, Order, OrderStatus};
use crate::error::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, ValidatedJson};
use crate::response::ApiResponse;
use crate::store::Store;

/// Fresh order numbers tried before a collision is reported.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub customer_email: String,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

pub async fn list_orders(State(s): State<AppState>, ApiQuery(p): ApiQuery<ListParams>) -> AppResult<ApiResponse<Paginated<Order>>> {
    let page = p.page();
    Ok(ApiResponse::data(Paginated::new(s.store.list_orders(page).await?, page)))
}

pub async fn get_order(State(s): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> AppResult<ApiResponse<Order>> {
    let order = s.store.get_order(id).await?.ok_or_else(|| AppError::not_found("Order not found"))?;
    Ok(ApiResponse::data(order))
}

/// Inserts the order `build` returns, rebuilding it with a new number when
/// the random order number is already taken.
async fn insert_with_fresh_number(store: &dyn Store, mut build: impl FnMut() -> AppResult<Order> + Send) -> AppResult<Order> {
    let mut attempt = 1;
    loop {
        let order = build()?;
        match store.insert_order(&order).await {
            Ok(()) => return Ok(order),
            Err(AppError::DuplicateKey { ref field, .. }) if field == "order_number" && attempt < ORDER_NUMBER_ATTEMPTS => {
                tracing::warn!(order_number = %order.order_number, attempt, "order number taken, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Prices are copied from the product records at creation time.
pub async fn create_order(State(s): State<AppState>, ValidatedJson(r): ValidatedJson<CreateOrderRequest>) -> AppResult<ApiResponse<Order>> {
    let mut items = Vec::with_capacity(r.items.len());
    for line in r.items {
        if line.quantity < 1 {
            return Err(AppError::Validation(vec!["Quantity must be at least 1".into()]));
        }
        let product = s.store.get_product(line.product_id).await?
            .filter(|p| p.is_active())
            .ok_or_else(|| AppError::not_found("Product not found"))?;
        items.push(LineItem {
            product_id: product.id,
            name: product.name,
            sku: product.sku.to_string(),
            quantity: line.quantity,
            unit_price: product.price,
        });
    }
    let coupon = match r.coupon_code.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(code) => Some(s.store.get_coupon(code).await?.ok_or_else(|| AppError::not_found("Coupon not found"))?),
        None => None,
    };
    let email = r.customer_email;
    let mut order = insert_with_fresh_number(s.store.as_ref(), || {
        Ok(Order::create_with_coupon(email.clone(), items.clone(), coupon.as_ref())?)
    })
    .await?;
    s.events.publish_all(order.take_events()).await;
    s.store.insert_notification(&Notification::order_placed(&order)).await?;
    tracing::info!(order_id = %order.id, order_number = %order.order_number, total = order.total, "order created");
    Ok(ApiResponse::data(order).with_message("Order created").with_status(StatusCode::CREATED))
}

pub async fn update_status(
    State(s): State<AppState>, ApiPath(id): ApiPath<Uuid>, ApiJson(r): ApiJson<UpdateStatusRequest>,
) -> AppResult<ApiResponse<Order>> {
    let mut order = s.store.get_order(id).await?.ok_or_else(|| AppError::not_found("Order not found"))?;
    order.transition(r.status)?;
    s.store.update_order_status(&order).await?;
    s.events.publish_all(order.take_events()).await;
    s.store.insert_notification(&Notification::order_status_changed(&order)).await?;
    Ok(ApiResponse::data(order).with_message("Order status updated"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use uuid::Uuid;

    fn numbered(number: &str) -> AppResult<Order> {
        let item = LineItem { product_id: Uuid::nil(), name: "W".into(), sku: "W".into(), quantity: 1, unit_price: 10 };
        let mut order = Order::create("c@example.com", vec![item])?;
        order.order_number = number.to_string();
        Ok(order)
    }

    #[tokio::test]
    async fn test_order_number_collision_is_retried() {
        let store = MemoryStore::new();
        store.insert_order(&numbered("ORD-00000001").unwrap()).await.unwrap();
        let mut numbers = ["ORD-00000001", "ORD-00000002"].into_iter();
        let order = insert_with_fresh_number(&store, || numbered(numbers.next().unwrap_or("ORD-99999999"))).await.unwrap();
        assert_eq!(order.order_number, "ORD-00000002");
        assert_eq!(store.list_orders(crate::store::Page::new(None, None)).await.unwrap().1, 2);
    }

    #[tokio::test]
    async fn test_persistent_collision_is_reported() {
        let store = MemoryStore::new();
        store.insert_order(&numbered("ORD-00000001").unwrap()).await.unwrap();
        let mut builds = 0;
        let err = insert_with_fresh_number(&store, || {
            builds += 1;
            numbered("ORD-00000001")
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey { ref field, .. } if field == "order_number"));
        assert_eq!(builds, ORDER_NUMBER_ATTEMPTS);
    }
}
