//! Evaluation of the JSON query DSL against in-memory documents.

use std::cmp::Ordering;

use serde::Deserialize;
use serde_json::{Map, Number, Value};

#[derive(Debug, Default, Deserialize)]
pub struct Query {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub filter: Vec<Value>,
    #[serde(default)]
    pub sort: Vec<Map<String, Value>>,
    #[serde(default)]
    pub aggregation: Vec<Map<String, Value>>,
    #[serde(default)]
    pub highlight: Vec<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct QueryError(pub String);

/// What a query evaluates to.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Documents(Vec<Value>),
    Count(usize),
    Aggregated {
        documents: Vec<Value>,
        aggregations: Map<String, Value>,
    },
}

impl Outcome {
    pub fn into_json(self) -> Value {
        match self {
            Outcome::Documents(documents) => Value::Array(documents),
            Outcome::Count(count) => Value::from(count),
            Outcome::Aggregated {
                documents,
                aggregations,
            } => serde_json::json!({
                "documents": documents,
                "aggregations": aggregations,
            }),
        }
    }
}

pub fn run(query: &Query, documents: &[Value]) -> Result<Outcome, QueryError> {
    let mut matched = Vec::new();
    for document in documents {
        if all_match(&query.filter, document)? {
            matched.push(document.clone());
        }
    }

    if query.kind.as_deref() == Some("count") {
        return Ok(Outcome::Count(matched.len()));
    }

    for clause in query.sort.iter().rev() {
        let (field, direction) = single_entry(clause)?;
        let descending = match direction.as_str() {
            Some("asc") => false,
            Some("desc") => true,
            _ => return Err(QueryError(format!("bad sort direction for {field}"))),
        };
        // Stable sorts applied last-to-first give first-clause priority.
        matched.sort_by(|a, b| {
            let ordering = compare(a.get(field), b.get(field));
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    let aggregations = aggregate(&query.aggregation, &matched)?;

    let page: Vec<Value> = matched
        .into_iter()
        .skip(query.offset.unwrap_or(0))
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();

    if query.aggregation.is_empty() {
        Ok(Outcome::Documents(page))
    } else {
        Ok(Outcome::Aggregated {
            documents: page,
            aggregations,
        })
    }
}

fn all_match(filters: &[Value], document: &Value) -> Result<bool, QueryError> {
    for filter in filters {
        if !matches(filter, document)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches(filter: &Value, document: &Value) -> Result<bool, QueryError> {
    let clause = filter
        .as_object()
        .ok_or_else(|| QueryError("filter clause must be an object".to_string()))?;
    let (key, condition) = single_entry(clause)?;

    match key.as_str() {
        "and" => {
            let filters = condition
                .as_array()
                .ok_or_else(|| QueryError("and expects an array".to_string()))?;
            all_match(filters, document)
        }
        "or" => {
            let filters = condition
                .as_array()
                .ok_or_else(|| QueryError("or expects an array".to_string()))?;
            for filter in filters {
                if matches(filter, document)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        field => test(field, condition, document),
    }
}

fn test(field: &str, condition: &Value, document: &Value) -> Result<bool, QueryError> {
    let actual = document.get(field);
    let operator = condition.get("operator").and_then(Value::as_str);
    let expected = condition.get("value");

    let outcome = match (operator, expected) {
        (None, None) | (Some("exists"), _) => actual.is_some(),
        (Some("missing"), _) => actual.is_none(),
        (Some("="), Some(expected)) => actual == Some(expected),
        (Some("!="), Some(expected)) => actual != Some(expected),
        (Some(">"), Some(expected)) => ordering(actual, expected).is_some_and(Ordering::is_gt),
        (Some(">="), Some(expected)) => ordering(actual, expected).is_some_and(Ordering::is_ge),
        (Some("<"), Some(expected)) => ordering(actual, expected).is_some_and(Ordering::is_lt),
        (Some("<="), Some(expected)) => ordering(actual, expected).is_some_and(Ordering::is_le),
        (Some("any"), Some(Value::Array(options))) => actual.is_some_and(|a| options.contains(a)),
        (Some("none"), Some(Value::Array(options))) => !actual.is_some_and(|a| options.contains(a)),
        (Some("match"), Some(Value::String(needle))) => actual
            .and_then(Value::as_str)
            .is_some_and(|text| text.to_lowercase().contains(&needle.to_lowercase())),
        (operator, _) => {
            return Err(QueryError(format!(
                "unsupported filter on {field}: {}",
                operator.unwrap_or("<none>")
            )))
        }
    };
    Ok(outcome)
}

/// Range comparisons never match documents without the field.
fn ordering(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    actual.map(|actual| compare(Some(actual), Some(expected)))
}

fn aggregate(
    clauses: &[Map<String, Value>],
    documents: &[Value],
) -> Result<Map<String, Value>, QueryError> {
    let mut results = Map::new();
    for clause in clauses {
        let (field, metric) = single_entry(clause)?;
        let name = metric
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| QueryError(format!("aggregation on {field} has no name")))?;
        let operator = metric.get("operator").and_then(Value::as_str).unwrap_or("count");

        let numbers: Vec<f64> = documents
            .iter()
            .filter_map(|d| d.get(field).and_then(Value::as_f64))
            .collect();

        let value = match operator {
            "count" => Value::from(documents.iter().filter(|d| d.get(field).is_some()).count()),
            "missing" => Value::from(documents.iter().filter(|d| d.get(field).is_none()).count()),
            "sum" => number(numbers.iter().sum()),
            "min" => numbers.iter().copied().reduce(f64::min).map_or(Value::Null, number),
            "max" => numbers.iter().copied().reduce(f64::max).map_or(Value::Null, number),
            "avg" if numbers.is_empty() => Value::Null,
            "avg" => number(numbers.iter().sum::<f64>() / numbers.len() as f64),
            other => return Err(QueryError(format!("unsupported aggregation {other}"))),
        };
        results.insert(name.to_string(), value);
    }
    Ok(results)
}

fn number(n: f64) -> Value {
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

fn single_entry(map: &Map<String, Value>) -> Result<(&String, &Value), QueryError> {
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry),
        _ => Err(QueryError("clause must have exactly one key".to_string())),
    }
}

/// Order missing < null < bool < number < string; other types compare equal.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
