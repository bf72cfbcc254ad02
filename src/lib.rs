//! Storefront Analytics
//!
//! Catalog and order service with admin sales analytics.
//!
//! ## Features
//! - Product and category catalog
//! - Order lifecycle with purchase-log events
//! - Per-product sales reports and stock movement history
//! - Uniform response envelope with mode-aware error normalization

pub mod analytics;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod store;

pub use config::{AppConfig, Mode};
pub use error::{AppError, AppResult};
pub use response::ApiResponse;
pub use routes::{router, AppState};
