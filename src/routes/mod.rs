//! HTTP surface: router, shared state and layer stack.

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::{get, patch};
use axum::{middleware as mw, Router};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::TokenVerifier;
use crate::events::EventPublisher;
use crate::middleware::{self, ErrorPolicy};
use crate::response::ApiResponse;
use crate::store::Store;

pub mod accounts;
pub mod analytics;
pub mod catalog;
pub mod coupons;
pub mod notifications;
pub mod orders;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub events: EventPublisher,
    pub verifier: TokenVerifier,
}

impl FromRef<AppState> for TokenVerifier {
    fn from_ref(state: &AppState) -> Self { state.verifier.clone() }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
}

async fn health() -> ApiResponse<Health> {
    ApiResponse::data(Health { status: "healthy", service: "storefront-analytics" })
}

pub fn router(state: AppState, policy: ErrorPolicy) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/products", get(catalog::list_products).post(catalog::create_product))
        .route("/api/v1/products/:id", get(catalog::get_product).delete(catalog::delete_product))
        .route("/api/v1/categories", get(catalog::list_categories).post(catalog::create_category))
        .route("/api/v1/categories/:id", get(catalog::get_category))
        .route("/api/v1/orders", get(orders::list_orders).post(orders::create_order))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/orders/:id/status", patch(orders::update_status))
        .route("/api/v1/users", get(accounts::list_users).post(accounts::create_user))
        .route("/api/v1/users/:id", get(accounts::get_user))
        .route("/api/v1/users/:id/addresses", get(accounts::list_addresses).post(accounts::add_address))
        .route("/api/v1/coupons", get(coupons::list_coupons).post(coupons::create_coupon))
        .route("/api/v1/coupons/:code", get(coupons::get_coupon))
        .route("/api/v1/notifications", get(notifications::list_notifications))
        .route("/api/v1/notifications/:id/read", patch(notifications::mark_read))
        .route("/api/v1/admin/analytics/products/:id/sales", get(analytics::product_sales))
        .route("/api/v1/admin/analytics/products/:id/stock-history", get(analytics::stock_history))
        .route("/api/v1/admin/analytics/products/:id/stock-history/paged", get(analytics::stock_history_paged))
        .fallback(middleware::not_found)
        .layer(CatchPanicLayer::custom(middleware::panic_to_error))
        .layer(mw::from_fn(middleware::malformed_body_filter))
        .layer(mw::from_fn_with_state(policy, middleware::error_classifier))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;
    use crate::config::Mode;
    use crate::store::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, StatusCode};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    type HttpRequest = axum::http::Request<Body>;

    const SECRET: &str = "test-secret";

    fn app() -> Router {
        let state = AppState {
            store: Arc::new(MemoryStore::new()),
            events: EventPublisher::default(),
            verifier: TokenVerifier::new(SECRET),
        };
        router(state, ErrorPolicy::new(Mode::Production))
    }

    fn token(role: &str, exp_offset: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as usize;
        let claims = Claims { sub: "u1".into(), role: role.into(), exp };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>, bearer: Option<&str>) -> (StatusCode, Value) {
        let mut req = axum::http::Request::builder().method(method).uri(uri);
        if body.is_some() {
            req = req.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(t) = bearer {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req: HttpRequest = req.body(Body::from(body.unwrap_or_default().to_string())).unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn create_product(app: &Router, sku: &str, price: i64) -> String {
        let body = json!({ "sku": sku, "name": "Widget", "price": price }).to_string();
        let (status, v) = send(app, Method::POST, "/api/v1/products", Some(&body), None).await;
        assert_eq!(status, StatusCode::CREATED);
        v["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_and_unknown_route() {
        let app = app();
        let (status, v) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["status"], "healthy");

        let (status, v) = send(&app, Method::GET, "/api/v1/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(v["message"], "Route /api/v1/nope not found");
        assert_eq!(v["type"], "error");
    }

    #[tokio::test]
    async fn test_malformed_json_body() {
        let (status, v) = send(&app(), Method::POST, "/api/v1/categories", Some("{\"name\": "), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["message"], "Invalid JSON payload");
        assert_eq!(v["success"], false);
    }

    #[tokio::test]
    async fn test_duplicate_slug_and_validation() {
        let app = app();
        let body = json!({ "name": "Garden Tools" }).to_string();
        let (status, v) = send(&app, Method::POST, "/api/v1/categories", Some(&body), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["data"]["slug"], "garden-tools");

        let (status, v) = send(&app, Method::POST, "/api/v1/categories", Some(&body), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(v["message"], "Slug already exists");

        let (status, v) = send(&app, Method::POST, "/api/v1/categories", Some(r#"{"name": ""}"#), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["message"], "Name is required");
    }

    #[tokio::test]
    async fn test_invalid_id_is_not_found() {
        let (status, v) = send(&app(), Method::GET, "/api/v1/products/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(v["message"], "Resource not found");
    }

    #[tokio::test]
    async fn test_order_lifecycle() {
        let app = app();
        let product = create_product(&app, "w-1", 250).await;
        let body = json!({ "customer_email": "c@example.com", "items": [{ "product_id": product, "quantity": 2 }] }).to_string();
        let (status, v) = send(&app, Method::POST, "/api/v1/orders", Some(&body), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["data"]["total"], 500);
        assert_eq!(v["data"]["status"], "pending");
        let id = v["data"]["id"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/orders/{id}/status");
        let (status, v) = send(&app, Method::PATCH, &uri, Some(r#"{"status": "delivered"}"#), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["message"], "Cannot change order status from pending to delivered");

        let (status, v) = send(&app, Method::PATCH, &uri, Some(r#"{"status": "confirmed"}"#), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["status"], "confirmed");
    }

    #[tokio::test]
    async fn test_order_rejects_unknown_product_and_bad_email() {
        let app = app();
        let body = json!({ "customer_email": "c@example.com", "items": [{ "product_id": uuid::Uuid::new_v4(), "quantity": 1 }] }).to_string();
        let (status, v) = send(&app, Method::POST, "/api/v1/orders", Some(&body), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(v["message"], "Product not found");

        let body = json!({ "customer_email": "nope", "items": [] }).to_string();
        let (status, _) = send(&app, Method::POST, "/api/v1/orders", Some(&body), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_soft_deleted_product_leaves_listing() {
        let app = app();
        let id = create_product(&app, "gone", 10).await;
        let (status, v) = send(&app, Method::DELETE, &format!("/api/v1/products/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["message"], "Product deleted");
        let (_, v) = send(&app, Method::GET, "/api/v1/products", None, None).await;
        assert_eq!(v["data"]["total"], 0);
        let (_, v) = send(&app, Method::GET, &format!("/api/v1/products/{id}"), None, None).await;
        assert_eq!(v["data"]["status"], "deleted");
    }

    #[tokio::test]
    async fn test_admin_analytics_requires_admin_token() {
        let app = app();
        let id = create_product(&app, "an-1", 100).await;
        let uri = format!("/api/v1/admin/analytics/products/{id}/sales");

        let (status, v) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(v["message"], "Not authorized, no token");

        let (status, v) = send(&app, Method::GET, &uri, None, Some(&token("admin", -3600))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(v["message"], "Token expired. Please login again");

        let (status, v) = send(&app, Method::GET, &uri, None, Some("garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(v["message"], "Invalid token. Please login again");

        let (status, _) = send(&app, Method::GET, &uri, None, Some(&token("customer", 600))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, v) = send(&app, Method::GET, &uri, None, Some(&token("admin", 600))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["totalRevenue"], 0);
        assert_eq!(v["data"]["growthPercent"], 0.0);
    }

    #[tokio::test]
    async fn test_admin_stock_history_routes() {
        let app = app();
        let id = create_product(&app, "st-1", 100).await;
        let body = json!({ "customer_email": "c@example.com", "items": [{ "product_id": id, "quantity": 3 }] }).to_string();
        send(&app, Method::POST, "/api/v1/orders", Some(&body), None).await;
        let admin = token("admin", 600);

        let uri = format!("/api/v1/admin/analytics/products/{id}/stock-history?days=7");
        let (status, v) = send(&app, Method::GET, &uri, None, Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"][0]["quantity"], -3);
        // pending is outside the reduced set on the summary route
        assert_eq!(v["data"][0]["action"], "Stock Added");

        let uri = format!("/api/v1/admin/analytics/products/{id}/stock-history/paged?page=1&limit=5");
        let (status, v) = send(&app, Method::GET, &uri, None, Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["total"], 1);
        assert_eq!(v["data"]["history"][0]["action"], "Stock Reduced");
        assert_eq!(v["data"]["history"][0]["status"], "pending");

        let uri = format!("/api/v1/admin/analytics/products/{id}/stock-history?days=4000000000");
        let (status, v) = send(&app, Method::GET, &uri, None, Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"].as_array().unwrap().len(), 1);

        let uri = format!("/api/v1/admin/analytics/products/{id}/stock-history/paged?page=18446744073709551615&limit=100");
        let (status, v) = send(&app, Method::GET, &uri, None, Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(v["data"]["history"].as_array().unwrap().is_empty());
        assert_eq!(v["data"]["total"], 1);

        let missing = format!("/api/v1/admin/analytics/products/{}/sales", uuid::Uuid::new_v4());
        let (status, v) = send(&app, Method::GET, &missing, None, Some(&admin)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(v["message"], "Product not found");
    }
    #[tokio::test]
    async fn test_order_total_overflow_is_rejected() {
        let app = app();
        let product = create_product(&app, "big-1", i64::MAX).await;
        let body = json!({ "customer_email": "c@example.com", "items": [{ "product_id": product, "quantity": 2 }] }).to_string();
        let (status, v) = send(&app, Method::POST, "/api/v1/orders", Some(&body), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["message"], "Order total is too large");
    }

    #[tokio::test]
    async fn test_coupon_applies_to_new_order() {
        let app = app();
        let admin = token("admin", 600);
        let coupon = json!({ "code": "save20", "discount_percent": 20 }).to_string();
        let (status, _) = send(&app, Method::POST, "/api/v1/coupons", Some(&coupon), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, v) = send(&app, Method::POST, "/api/v1/coupons", Some(&coupon), Some(&admin)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["data"]["code"], "SAVE20");
        let (status, v) = send(&app, Method::POST, "/api/v1/coupons", Some(&coupon), Some(&admin)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(v["message"], "Code already exists");

        let (status, _) = send(&app, Method::GET, "/api/v1/coupons/Save20", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let product = create_product(&app, "cp-1", 1000).await;
        let body = json!({ "customer_email": "c@example.com", "coupon_code": "save20",
            "items": [{ "product_id": product, "quantity": 1 }] }).to_string();
        let (status, v) = send(&app, Method::POST, "/api/v1/orders", Some(&body), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!((v["data"]["total"].as_i64(), v["data"]["discount"].as_i64()), (Some(800), Some(200)));

        let body = json!({ "customer_email": "c@example.com", "coupon_code": "nope",
            "items": [{ "product_id": product, "quantity": 1 }] }).to_string();
        let (status, v) = send(&app, Method::POST, "/api/v1/orders", Some(&body), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(v["message"], "Coupon not found");
    }

    #[tokio::test]
    async fn test_users_and_addresses() {
        let app = app();
        let body = json!({ "name": "Ada", "email": "Ada@Example.com" }).to_string();
        let (status, v) = send(&app, Method::POST, "/api/v1/users", Some(&body), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["data"]["email"], "ada@example.com");
        let id = v["data"]["id"].as_str().unwrap().to_string();

        let (status, v) = send(&app, Method::POST, "/api/v1/users", Some(&body), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(v["message"], "Email already exists");

        let uri = format!("/api/v1/users/{id}/addresses");
        let address = json!({ "line1": "1 Marina", "city": "Lagos", "postal_code": "100001", "country": "ng" }).to_string();
        let (status, v) = send(&app, Method::POST, &uri, Some(&address), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["data"]["is_default"], true);
        assert_eq!(v["data"]["country"], "NG");
        send(&app, Method::POST, &uri, Some(&address), None).await;
        let (_, v) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(v["data"].as_array().unwrap().len(), 2);
        assert_eq!(v["data"][1]["is_default"], false);

        let missing = format!("/api/v1/users/{}/addresses", uuid::Uuid::new_v4());
        let (status, v) = send(&app, Method::GET, &missing, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(v["message"], "User not found");
    }

    #[tokio::test]
    async fn test_order_events_leave_notifications() {
        let app = app();
        let product = create_product(&app, "nt-1", 50).await;
        let body = json!({ "customer_email": "Buyer@Example.com", "items": [{ "product_id": product, "quantity": 1 }] }).to_string();
        let (_, v) = send(&app, Method::POST, "/api/v1/orders", Some(&body), None).await;
        let order = v["data"]["id"].as_str().unwrap().to_string();
        send(&app, Method::PATCH, &format!("/api/v1/orders/{order}/status"), Some(r#"{"status": "confirmed"}"#), None).await;

        let (status, v) = send(&app, Method::GET, "/api/v1/notifications?email=buyer@example.com", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let list = v["data"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|n| n["read"] == false));

        let id = list[0]["id"].as_str().unwrap().to_string();
        let (status, v) = send(&app, Method::PATCH, &format!("/api/v1/notifications/{id}/read"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["read"], true);
    }
}
