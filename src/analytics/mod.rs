//! Product sales analytics.
//!
//! Reports are expressed as aggregation pipelines over the order collection
//! ([`pipeline`], [`builders`]) and executed by the store, which runs them
//! through the in-process evaluator in [`eval`].

pub mod builders;
pub mod eval;
pub mod pipeline;
pub mod report;

pub use report::{ProductSalesReport, ReportWindow, StockHistoryPage, StockMovement};
