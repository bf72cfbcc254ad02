//! In-process executor for [`Pipeline`]s over order documents.
//!
//! Follows document-database semantics for the stages the report builders
//! emit. Type mismatches inside expressions evaluate to `null` rather than
//! failing the whole pipeline.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde_json::{json, Map, Number, Value};

use super::pipeline::{Accumulator, Expr, Filter, Pipeline, Projection, SortOrder, Stage};

pub fn run(pipeline: &Pipeline, docs: Vec<Value>) -> Vec<Value> {
    run_stages(pipeline.stages(), docs)
}

fn run_stages(stages: &[Stage], docs: Vec<Value>) -> Vec<Value> {
    stages.iter().fold(docs, |docs, stage| apply(stage, docs))
}

fn apply(stage: &Stage, mut docs: Vec<Value>) -> Vec<Value> {
    match stage {
        Stage::Match(filter) => docs.into_iter().filter(|d| matches(filter, d)).collect(),
        Stage::Unwind(path) => docs.into_iter().flat_map(|d| unwind(d, path)).collect(),
        Stage::Group { key, fields } => group(docs, key, fields),
        Stage::Sort(keys) => {
            docs.sort_by(|a, b| {
                keys.iter()
                    .map(|(path, order)| {
                        let ord = sort_cmp(&get_path(a, path), &get_path(b, path));
                        if *order == SortOrder::Descending { ord.reverse() } else { ord }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
            docs
        }
        Stage::Project(fields) => docs.iter().map(|d| project(d, fields)).collect(),
        Stage::Skip(n) => docs.into_iter().skip(usize::try_from(*n).unwrap_or(usize::MAX)).collect(),
        Stage::Limit(n) => docs.into_iter().take(usize::try_from(*n).unwrap_or(usize::MAX)).collect(),
        Stage::Facet(branches) => {
            let out: Map<String, Value> = branches.iter()
                .map(|(name, stages)| (name.clone(), Value::Array(run_stages(stages, docs.clone()))))
                .collect();
            vec![Value::Object(out)]
        }
        Stage::Count(_) if docs.is_empty() => vec![],
        Stage::Count(field) => {
            let mut out = Map::new();
            out.insert(field.clone(), json!(docs.len()));
            vec![Value::Object(out)]
        }
    }
}

// ---------------------------------------------------------------------------
// $match
// ---------------------------------------------------------------------------

fn matches(filter: &Filter, doc: &Value) -> bool {
    match filter {
        Filter::Eq(path, expected) => candidates(doc, path).into_iter().any(|v| equal(v, expected)),
        Filter::In(path, list) => candidates(doc, path).into_iter().any(|v| list.iter().any(|e| equal(v, e))),
        Filter::Range { field, gte, lt } => candidates(doc, field).into_iter().any(|v| {
            let above = gte.as_ref().map_or(true, |b| matches!(compare(v, b), Some(Ordering::Greater | Ordering::Equal)));
            let below = lt.as_ref().map_or(true, |b| compare(v, b) == Some(Ordering::Less));
            above && below
        }),
        Filter::And(filters) => filters.iter().all(|f| matches(f, doc)),
    }
}

/// Every value a dotted path reaches, fanning out over arrays. A terminal
/// array contributes both itself and its elements.
fn candidates<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => next.extend(map.get(segment)),
                Value::Array(items) => next.extend(items.iter().filter_map(|item| item.get(segment))),
                _ => {}
            }
        }
        current = next;
    }
    let mut out = Vec::with_capacity(current.len());
    for value in current {
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
        out.push(value);
    }
    out
}

// ---------------------------------------------------------------------------
// $unwind / $group / $project
// ---------------------------------------------------------------------------

fn unwind(doc: Value, path: &str) -> Vec<Value> {
    let elements = match doc.get(path) {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => return vec![],
        Some(other) => vec![other.clone()],
    };
    elements
        .into_iter()
        .map(|element| {
            let mut out = doc.clone();
            if let Value::Object(map) = &mut out {
                map.insert(path.to_string(), element);
            }
            out
        })
        .collect()
}

fn group(docs: Vec<Value>, key: &Expr, fields: &[(String, Accumulator)]) -> Vec<Value> {
    let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
    for doc in &docs {
        let id = eval(key, doc);
        let idx = match groups.iter().position(|(k, _)| equal(k, &id)) {
            Some(idx) => idx,
            None => {
                groups.push((id, vec![json!(0); fields.len()]));
                groups.len() - 1
            }
        };
        let totals = &mut groups[idx].1;
        for (total, (_, acc)) in totals.iter_mut().zip(fields) {
            match acc {
                Accumulator::Sum(expr) => {
                    let v = eval(expr, doc);
                    if v.is_number() {
                        *total = arithmetic(total, &v, i64::checked_add, |a, b| a + b);
                    }
                }
            }
        }
    }
    groups
        .into_iter()
        .map(|(id, totals)| {
            let mut out = Map::new();
            out.insert("_id".into(), id);
            for ((name, _), total) in fields.iter().zip(totals) {
                out.insert(name.clone(), total);
            }
            Value::Object(out)
        })
        .collect()
}

fn project(doc: &Value, fields: &[(String, Projection)]) -> Value {
    let mut out = Map::new();
    let keep_id = !fields.iter().any(|(k, p)| k == "_id" && *p == Projection::Exclude);
    if keep_id {
        if let Some(id) = doc.get("_id") {
            out.insert("_id".into(), id.clone());
        }
    }
    for (name, projection) in fields {
        match projection {
            Projection::Include => {
                if let Some(v) = lookup(doc, name) {
                    out.insert(name.clone(), v.clone());
                }
            }
            Projection::Exclude => {}
            Projection::Computed(expr) => { out.insert(name.clone(), eval(expr, doc)); }
        }
    }
    Value::Object(out)
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |v, segment| v.get(segment))
}

fn get_path(doc: &Value, path: &str) -> Value { lookup(doc, path).cloned().unwrap_or(Value::Null) }

fn eval(expr: &Expr, doc: &Value) -> Value {
    match expr {
        Expr::Field(path) => get_path(doc, path),
        Expr::Literal(v) => v.clone(),
        Expr::Object(fields) => Value::Object(fields.iter().map(|(k, e)| (k.clone(), eval(e, doc))).collect()),
        Expr::Multiply(args) => {
            let mut product = json!(1);
            for arg in args {
                let v = eval(arg, doc);
                if !v.is_number() {
                    return Value::Null;
                }
                product = arithmetic(&product, &v, i64::checked_mul, |a, b| a * b);
            }
            product
        }
        Expr::Concat(args) => {
            let mut out = String::new();
            for arg in args {
                match eval(arg, doc) {
                    Value::String(s) => out.push_str(&s),
                    _ => return Value::Null,
                }
            }
            Value::String(out)
        }
        Expr::ToString(e) => {
            let v = eval(e, doc);
            match as_date(&v) {
                Some(d) => Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
                None => match v {
                    Value::Null => Value::Null,
                    Value::String(s) => Value::String(s),
                    Value::Number(n) => Value::String(n.to_string()),
                    Value::Bool(b) => Value::String(b.to_string()),
                    other => Value::String(other.to_string()),
                },
            }
        }
        Expr::Year(e) => as_date(&eval(e, doc)).map_or(Value::Null, |d| json!(d.year())),
        Expr::Month(e) => as_date(&eval(e, doc)).map_or(Value::Null, |d| json!(d.month())),
        Expr::DateToString { format, date } => {
            as_date(&eval(date, doc)).map_or(Value::Null, |d| Value::String(d.format(format).to_string()))
        }
        Expr::Cond { test, then, otherwise } => {
            if truthy(&eval(test, doc)) { eval(then, doc) } else { eval(otherwise, doc) }
        }
        Expr::In(value, list) => {
            let v = eval(value, doc);
            Value::Bool(list.iter().any(|e| equal(&v, e)))
        }
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        _ => true,
    }
}

/// Integer arithmetic while both sides are integers and it fits, floats otherwise.
fn arithmetic(a: &Value, b: &Value, int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> Value {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(r) = int_op(x, y) {
            return json!(r);
        }
    }
    let x = a.as_f64().unwrap_or(0.0);
    let y = b.as_f64().unwrap_or(0.0);
    Number::from_f64(float_op(x, y)).map_or(Value::Null, Value::Number)
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

fn as_date(v: &Value) -> Option<DateTime<Utc>> {
    let map = v.as_object()?;
    if map.len() != 1 {
        return None;
    }
    let raw = map.get("$date")?.as_str()?;
    DateTime::parse_from_rfc3339(raw).ok().map(|d| d.with_timezone(&Utc))
}

/// Ordering between two values of comparable type, `None` across types.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_date(a), as_date(b)) {
        return Some(x.cmp(&y));
    }
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => (a == b).then_some(Ordering::Equal),
    }
}

fn equal(a: &Value, b: &Value) -> bool { compare(a, b) == Some(Ordering::Equal) }

/// Total order for `$sort`: null < numbers < strings < objects < arrays < booleans < dates.
fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        if as_date(v).is_some() {
            return 6;
        }
        match v {
            Value::Null => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Object(_) => 3,
            Value::Array(_) => 4,
            Value::Bool(_) => 5,
        }
    }
    rank(a).cmp(&rank(b)).then_with(|| compare(a, b).unwrap_or(Ordering::Equal))
}
