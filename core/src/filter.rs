//! Constructors for common filter clauses.

use serde_json::Value;

use crate::query::Filter;

pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Filter {
    Filter::new(field, "=", value)
}

pub fn not_equal(field: impl Into<String>, value: impl Into<Value>) -> Filter {
    Filter::new(field, "!=", value)
}

pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Filter {
    Filter::new(field, ">", value)
}

pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Filter {
    Filter::new(field, ">=", value)
}

pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Filter {
    Filter::new(field, "<", value)
}

pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Filter {
    Filter::new(field, "<=", value)
}

/// Matches when the field equals any of `values`.
pub fn any<I, V>(field: impl Into<String>, values: I) -> Filter
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Filter::new(field, "any", collect(values))
}

/// Matches when the field equals none of `values`.
pub fn none<I, V>(field: impl Into<String>, values: I) -> Filter
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Filter::new(field, "none", collect(values))
}

/// Full-text match.
pub fn matches(field: impl Into<String>, query: impl Into<String>) -> Filter {
    Filter::new(field, "match", query.into())
}

pub fn similar(field: impl Into<String>, query: impl Into<String>) -> Filter {
    Filter::new(field, "similar", query.into())
}

pub fn exists(field: impl Into<String>) -> Filter {
    Filter::unary(field, "exists")
}

pub fn missing(field: impl Into<String>) -> Filter {
    Filter::unary(field, "missing")
}

/// Inclusive range; either bound may be left open with `None`.
pub fn range(
    field: impl Into<String>,
    from: Option<impl Into<Value>>,
    to: Option<impl Into<Value>>,
) -> Filter {
    let mut bounds = serde_json::Map::new();
    if let Some(from) = from {
        bounds.insert("from".to_string(), from.into());
    }
    if let Some(to) = to {
        bounds.insert("to".to_string(), to.into());
    }
    Filter::new(field, "range", Value::Object(bounds))
}

fn collect<I, V>(values: I) -> Value
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Value::Array(values.into_iter().map(Into::into).collect())
}
