//! # Aggregation Pipeline AST
//!
//! A [`Pipeline`] is an ordered list of declarative stages run against the
//! order collection. It is built once per request and never mutated.
//! [`Pipeline::to_document`] renders it as MongoDB extended JSON; the
//! in-process executor in [`super::eval`] interprets the typed form directly.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

/// Extended-JSON date literal.
pub fn date(ts: DateTime<Utc>) -> Value {
    json!({ "$date": ts.to_rfc3339_opts(SecondsFormat::Millis, true) })
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self { Self { stages } }

    pub fn stages(&self) -> &[Stage] { &self.stages }

    pub fn to_document(&self) -> Value { render_stages(&self.stages) }

    /// Product id the leading `$match` pins `items.product` to, if any.
    /// Stores use it to narrow the candidate orders before execution.
    pub fn product_anchor(&self) -> Option<&str> {
        match self.stages.first()? {
            Stage::Match(filter) => filter.equality_on("items.product")?.as_str(),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder { Ascending, Descending }

#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    Match(Filter),
    /// Field path of the array to flatten, without the leading `$`.
    Unwind(String),
    Group { key: Expr, fields: Vec<(String, Accumulator)> },
    Sort(Vec<(String, SortOrder)>),
    Project(Vec<(String, Projection)>),
    Skip(u64),
    Limit(u64),
    Facet(Vec<(String, Vec<Stage>)>),
    Count(String),
}

impl Stage {
    fn render(&self) -> Value {
        match self {
            Stage::Match(filter) => json!({ "$match": filter.to_document() }),
            Stage::Unwind(path) => json!({ "$unwind": format!("${path}") }),
            Stage::Group { key, fields } => {
                let mut group = Map::new();
                group.insert("_id".into(), key.render());
                for (name, acc) in fields {
                    group.insert(name.clone(), acc.render());
                }
                json!({ "$group": group })
            }
            Stage::Sort(keys) => {
                let sort: Map<String, Value> = keys.iter()
                    .map(|(k, order)| (k.clone(), json!(if *order == SortOrder::Ascending { 1 } else { -1 })))
                    .collect();
                json!({ "$sort": sort })
            }
            Stage::Project(fields) => {
                let project: Map<String, Value> = fields.iter().map(|(k, p)| (k.clone(), p.render())).collect();
                json!({ "$project": project })
            }
            Stage::Skip(n) => json!({ "$skip": n }),
            Stage::Limit(n) => json!({ "$limit": n }),
            Stage::Facet(branches) => {
                let facet: Map<String, Value> = branches.iter().map(|(k, stages)| (k.clone(), render_stages(stages))).collect();
                json!({ "$facet": facet })
            }
            Stage::Count(field) => json!({ "$count": field }),
        }
    }
}

fn render_stages(stages: &[Stage]) -> Value { Value::Array(stages.iter().map(Stage::render).collect()) }

/// `$match` predicate over document field paths. Dotted paths traverse arrays.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
    /// Half-open range; either bound may be absent.
    Range { field: String, gte: Option<Value>, lt: Option<Value> },
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: Value) -> Self { Self::Eq(field.to_string(), value) }

    pub fn in_list(field: &str, values: Vec<Value>) -> Self { Self::In(field.to_string(), values) }

    pub fn since(field: &str, from: DateTime<Utc>) -> Self {
        Self::Range { field: field.to_string(), gte: Some(date(from)), lt: None }
    }

    pub fn between(field: &str, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self::Range { field: field.to_string(), gte: Some(date(from)), lt: Some(date(until)) }
    }

    pub fn to_document(&self) -> Value {
        let mut out = Map::new();
        self.render_into(&mut out);
        Value::Object(out)
    }

    fn render_into(&self, out: &mut Map<String, Value>) {
        match self {
            Filter::Eq(field, value) => { out.insert(field.clone(), value.clone()); }
            Filter::In(field, values) => { out.insert(field.clone(), json!({ "$in": values })); }
            Filter::Range { field, gte, lt } => {
                let mut range = Map::new();
                if let Some(v) = gte { range.insert("$gte".into(), v.clone()); }
                if let Some(v) = lt { range.insert("$lt".into(), v.clone()); }
                out.insert(field.clone(), Value::Object(range));
            }
            Filter::And(filters) => filters.iter().for_each(|f| f.render_into(out)),
        }
    }

    fn equality_on(&self, field: &str) -> Option<&Value> {
        match self {
            Filter::Eq(f, v) if f == field => Some(v),
            Filter::And(filters) => filters.iter().find_map(|f| f.equality_on(field)),
            _ => None,
        }
    }
}

/// Aggregation expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Field path without the leading `$`.
    Field(String),
    Literal(Value),
    Object(Vec<(String, Expr)>),
    Multiply(Vec<Expr>),
    Concat(Vec<Expr>),
    ToString(Box<Expr>),
    Year(Box<Expr>),
    Month(Box<Expr>),
    DateToString { format: String, date: Box<Expr> },
    Cond { test: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr> },
    In(Box<Expr>, Vec<Value>),
}

impl Expr {
    pub fn field(path: &str) -> Self { Self::Field(path.to_string()) }
    pub fn lit(value: impl Into<Value>) -> Self { Self::Literal(value.into()) }

    pub fn cond(test: Expr, then: Expr, otherwise: Expr) -> Self {
        Self::Cond { test: Box::new(test), then: Box::new(then), otherwise: Box::new(otherwise) }
    }

    pub fn is_in(value: Expr, list: Vec<Value>) -> Self { Self::In(Box::new(value), list) }

    fn render(&self) -> Value {
        match self {
            Expr::Field(path) => Value::String(format!("${path}")),
            Expr::Literal(Value::String(s)) if s.starts_with('$') => json!({ "$literal": s }),
            Expr::Literal(v) => v.clone(),
            Expr::Object(fields) => Value::Object(fields.iter().map(|(k, e)| (k.clone(), e.render())).collect()),
            Expr::Multiply(args) => json!({ "$multiply": args.iter().map(Expr::render).collect::<Vec<_>>() }),
            Expr::Concat(args) => json!({ "$concat": args.iter().map(Expr::render).collect::<Vec<_>>() }),
            Expr::ToString(e) => json!({ "$toString": e.render() }),
            Expr::Year(e) => json!({ "$year": e.render() }),
            Expr::Month(e) => json!({ "$month": e.render() }),
            Expr::DateToString { format, date } => json!({ "$dateToString": { "format": format, "date": date.render() } }),
            Expr::Cond { test, then, otherwise } => {
                json!({ "$cond": { "if": test.render(), "then": then.render(), "else": otherwise.render() } })
            }
            Expr::In(value, list) => json!({ "$in": [value.render(), list] }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Accumulator {
    Sum(Expr),
}

impl Accumulator {
    fn render(&self) -> Value {
        match self { Accumulator::Sum(e) => json!({ "$sum": e.render() }) }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    Include,
    Exclude,
    Computed(Expr),
}

impl Projection {
    fn render(&self) -> Value {
        match self {
            Projection::Include => json!(1),
            Projection::Exclude => json!(0),
            Projection::Computed(e) => e.render(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_renders_extended_json() {
        let since = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let p = Pipeline::new(vec![
            Stage::Match(Filter::And(vec![Filter::eq("items.product", json!("p1")), Filter::since("createdAt", since)])),
            Stage::Unwind("items".into()),
            Stage::Sort(vec![("_id.year".into(), SortOrder::Ascending), ("_id.month".into(), SortOrder::Ascending)]),
            Stage::Count("count".into()),
        ]);
        assert_eq!(
            p.to_document(),
            json!([
                { "$match": { "items.product": "p1", "createdAt": { "$gte": { "$date": "2025-03-01T00:00:00.000Z" } } } },
                { "$unwind": "$items" },
                { "$sort": { "_id.year": 1, "_id.month": 1 } },
                { "$count": "count" },
            ])
        );
        let sort_keys: Vec<_> = p.to_document()[2]["$sort"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(sort_keys, vec!["_id.year", "_id.month"]);
    }

    #[test]
    fn test_expression_rendering() {
        let e = Expr::cond(
            Expr::is_in(Expr::field("status"), vec![json!("cancelled")]),
            Expr::field("items.quantity"),
            Expr::Multiply(vec![Expr::field("items.quantity"), Expr::lit(-1)]),
        );
        assert_eq!(
            e.render(),
            json!({ "$cond": {
                "if": { "$in": ["$status", ["cancelled"]] },
                "then": "$items.quantity",
                "else": { "$multiply": ["$items.quantity", -1] },
            } })
        );
        assert_eq!(Expr::lit("$notAField").render(), json!({ "$literal": "$notAField" }));
    }

    #[test]
    fn test_product_anchor() {
        let p = Pipeline::new(vec![Stage::Match(Filter::And(vec![
            Filter::in_list("status", vec![json!("confirmed")]),
            Filter::eq("items.product", json!("abc")),
        ]))]);
        assert_eq!(p.product_anchor(), Some("abc"));
        assert_eq!(Pipeline::new(vec![Stage::Limit(1)]).product_anchor(), None);
    }
}
