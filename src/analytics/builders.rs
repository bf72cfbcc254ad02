//! # Report Pipeline Builders
//!
//! Pure functions from a product id and window boundaries to a [`Pipeline`]
//! over the order collection. All of them share the same prefix: keep orders
//! containing the product, flatten their items, then keep only that
//! product's items (the first filter tests containment at the order level).

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use super::pipeline::{Accumulator, Expr, Filter, Pipeline, Projection, SortOrder, Stage};
use crate::domain::aggregates::OrderStatus;

pub const STOCK_REDUCED: &str = "Stock Reduced";
pub const STOCK_ADDED: &str = "Stock Added";

/// Movements returned by the summary stock history.
pub const STOCK_HISTORY_LIMIT: u64 = 10;

const DISPLAY_DATE: &str = "%d/%m/%Y";

fn statuses(list: &[OrderStatus]) -> Vec<Value> { list.iter().map(|s| json!(s.as_str())).collect() }

fn product_key(product_id: Uuid) -> Value { json!(product_id.to_string()) }

/// Match orders containing the product (plus `order_filters`), unwind, re-match the item.
fn product_items(product_id: Uuid, order_filters: Vec<Filter>) -> Vec<Stage> {
    let mut filters = vec![Filter::eq("items.product", product_key(product_id))];
    filters.extend(order_filters);
    vec![
        Stage::Match(Filter::And(filters)),
        Stage::Unwind("items".into()),
        Stage::Match(Filter::eq("items.product", product_key(product_id))),
    ]
}

fn fulfilled() -> Filter { Filter::in_list("status", statuses(&OrderStatus::FULFILLED_OR_IN_FLIGHT)) }

fn line_revenue() -> Expr { Expr::Multiply(vec![Expr::field("items.quantity"), Expr::field("items.price")]) }

fn revenue_total(stages: &mut Vec<Stage>) {
    stages.push(Stage::Group {
        key: Expr::lit(Value::Null),
        fields: vec![("totalRevenue".into(), Accumulator::Sum(line_revenue()))],
    });
}

/// Restocked orders add their quantity back, every other status takes it out.
fn signed_quantity() -> Expr {
    Expr::cond(
        Expr::is_in(Expr::field("status"), statuses(&OrderStatus::RESTOCKED)),
        Expr::field("items.quantity"),
        Expr::Multiply(vec![Expr::field("items.quantity"), Expr::lit(-1)]),
    )
}

fn display_date() -> Expr {
    Expr::DateToString { format: DISPLAY_DATE.into(), date: Box::new(Expr::field("createdAt")) }
}

/// Lifetime revenue, quantity and line count for fulfilled or in-flight orders.
/// An empty result means no sales and decodes to zeros.
pub fn total_sales(product_id: Uuid) -> Pipeline {
    let mut stages = product_items(product_id, vec![fulfilled()]);
    stages.push(Stage::Group {
        key: Expr::lit(Value::Null),
        fields: vec![
            ("totalRevenue".into(), Accumulator::Sum(line_revenue())),
            ("totalQuantity".into(), Accumulator::Sum(Expr::field("items.quantity"))),
            ("totalOrders".into(), Accumulator::Sum(Expr::lit(1))),
        ],
    });
    Pipeline::new(stages)
}

/// Revenue and quantity per calendar month since `since`, oldest first, as
/// `{month: "<year>-<month>", revenue, quantity}`. Months are not zero-padded.
pub fn monthly_trend(product_id: Uuid, since: DateTime<Utc>) -> Pipeline {
    let mut stages = product_items(product_id, vec![fulfilled(), Filter::since("createdAt", since)]);
    stages.extend([
        Stage::Group {
            key: Expr::Object(vec![
                ("year".into(), Expr::Year(Box::new(Expr::field("createdAt")))),
                ("month".into(), Expr::Month(Box::new(Expr::field("createdAt")))),
            ]),
            fields: vec![
                ("revenue".into(), Accumulator::Sum(line_revenue())),
                ("quantity".into(), Accumulator::Sum(Expr::field("items.quantity"))),
            ],
        },
        Stage::Sort(vec![("_id.year".into(), SortOrder::Ascending), ("_id.month".into(), SortOrder::Ascending)]),
        Stage::Project(vec![
            ("_id".into(), Projection::Exclude),
            (
                "month".into(),
                Projection::Computed(Expr::Concat(vec![
                    Expr::ToString(Box::new(Expr::field("_id.year"))),
                    Expr::lit("-"),
                    Expr::ToString(Box::new(Expr::field("_id.month"))),
                ])),
            ),
            ("revenue".into(), Projection::Include),
            ("quantity".into(), Projection::Include),
        ]),
    ]);
    Pipeline::new(stages)
}

/// Revenue from `since` onwards. There is no upper bound, so with `since` set
/// to one month ago this covers the last month up to now.
pub fn last_month_revenue(product_id: Uuid, since: DateTime<Utc>) -> Pipeline {
    let mut stages = product_items(product_id, vec![fulfilled(), Filter::since("createdAt", since)]);
    revenue_total(&mut stages);
    Pipeline::new(stages)
}

/// Revenue for orders created in `[from, until)`.
pub fn previous_month_revenue(product_id: Uuid, from: DateTime<Utc>, until: DateTime<Utc>) -> Pipeline {
    let mut stages = product_items(product_id, vec![fulfilled(), Filter::between("createdAt", from, until)]);
    revenue_total(&mut stages);
    Pipeline::new(stages)
}

/// Latest stock movements for the product since `since`, every order status
/// included. Sorted on the formatted `dd/mm/yyyy` string, which is not
/// chronological across months or years.
///
/// `action` is `Stock Reduced` only for confirmed, processing, shipped and
/// delivered orders, so a `pending` order reads `Stock Added` here while its
/// quantity is still negative. [`stock_history_page`] labels `pending` as
/// `Stock Reduced`.
pub fn stock_history(product_id: Uuid, since: DateTime<Utc>) -> Pipeline {
    let mut stages = product_items(product_id, vec![Filter::since("createdAt", since)]);
    stages.extend([
        Stage::Project(vec![
            ("_id".into(), Projection::Exclude),
            ("date".into(), Projection::Computed(display_date())),
            (
                "action".into(),
                Projection::Computed(Expr::cond(
                    Expr::is_in(Expr::field("status"), statuses(&OrderStatus::FULFILLED_OR_IN_FLIGHT)),
                    Expr::lit(STOCK_REDUCED),
                    Expr::lit(STOCK_ADDED),
                )),
            ),
            ("quantity".into(), Projection::Computed(signed_quantity())),
        ]),
        Stage::Sort(vec![("date".into(), SortOrder::Descending)]),
        Stage::Limit(STOCK_HISTORY_LIMIT),
    ]);
    Pipeline::new(stages)
}

/// One page of stock movements (newest order first) plus the total number
/// of movements, as `{history: [...], total: [{count}]}`. `total` is empty
/// when nothing matched.
pub fn stock_history_page(product_id: Uuid, since: DateTime<Utc>, skip: u64, limit: u64) -> Pipeline {
    let mut stages = product_items(product_id, vec![Filter::since("createdAt", since)]);
    stages.extend([
        Stage::Sort(vec![("createdAt".into(), SortOrder::Descending)]),
        Stage::Project(vec![
            ("_id".into(), Projection::Exclude),
            ("orderNumber".into(), Projection::Include),
            ("status".into(), Projection::Include),
            ("date".into(), Projection::Computed(display_date())),
            (
                "action".into(),
                Projection::Computed(Expr::cond(
                    Expr::is_in(Expr::field("status"), statuses(&OrderStatus::RESTOCKED)),
                    Expr::lit(STOCK_ADDED),
                    Expr::lit(STOCK_REDUCED),
                )),
            ),
            ("quantity".into(), Projection::Computed(signed_quantity())),
        ]),
        Stage::Facet(vec![
            ("history".into(), vec![Stage::Skip(skip), Stage::Limit(limit.max(1))]),
            ("total".into(), vec![Stage::Count("count".into())]),
        ]),
    ]);
    Pipeline::new(stages)
}
