//! Constructors for aggregation clauses.
//!
//! Every helper takes the output `name` first and the source `field` second,
//! the same order as the tuple forms accepted by `aggregate`.

use serde_json::Value;

use crate::query::Aggregation;

pub fn avg(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
    Aggregation::new(name, field, "avg")
}

pub fn count(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
    Aggregation::new(name, field, "count")
}

pub fn extended_stats(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
    Aggregation::new(name, field, "extendedStats")
}

/// Bucket counts over fixed-width intervals of `field`.
pub fn histogram(
    name: impl Into<String>,
    field: impl Into<String>,
    interval: impl Into<Value>,
) -> Aggregation {
    Aggregation::new(name, field, "histogram").with_value(interval)
}

pub fn max(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
    Aggregation::new(name, field, "max")
}

pub fn min(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
    Aggregation::new(name, field, "min")
}

/// Number of documents without a value for `field`.
pub fn missing(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
    Aggregation::new(name, field, "missing")
}

pub fn stats(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
    Aggregation::new(name, field, "stats")
}

pub fn sum(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
    Aggregation::new(name, field, "sum")
}

/// Most frequent values of `field`, at most `size` buckets.
pub fn terms(name: impl Into<String>, field: impl Into<String>, size: u64) -> Aggregation {
    Aggregation::new(name, field, "terms").with_value(size)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_keys_by_field() {
        assert_eq!(
            serde_json::to_value(missing("m", "f")).unwrap(),
            json!({"f": {"name": "m", "operator": "missing"}})
        );
    }

    #[test]
    fn histogram_carries_interval() {
        assert_eq!(
            serde_json::to_value(histogram("by_age", "age", 10)).unwrap(),
            json!({"age": {"name": "by_age", "operator": "histogram", "value": 10}})
        );
    }

    #[test]
    fn with_value_leaves_raw_clauses_alone() {
        let raw = Aggregation::Raw(json!({"x": 1}));
        assert_eq!(raw.clone().with_value(3), raw);
    }
}
