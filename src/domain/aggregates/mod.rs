//! Aggregates module
pub mod coupon;
pub mod customer;
pub mod notification;
pub mod order;
pub mod product;

pub use coupon::Coupon;
pub use customer::{Address, User};
pub use notification::Notification;
pub use order::{LineItem, Order, OrderError, OrderStatus};
pub use product::{Category, Product, ProductStatus};
