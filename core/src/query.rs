//! Structured query accumulated by a request and sent as its JSON body.
//!
//! # Design
//! `QueryBuilder` only appends or overwrites; nothing is validated until the
//! server sees it. Serialization emits a key only when its category was
//! touched, in the fixed order `type`, `filter`, `sort`, `aggregation`,
//! `highlight`, `limit`, `offset`. Within a category call order is kept
//! because the receiving API evaluates clauses in order.
//!
//! `Filter` and `Aggregation` are the argument types of `filter` and
//! `aggregate`. They convert from short tuples of primitives or wrap a clause
//! built elsewhere (see the `filter` and `aggregation` helper modules).

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Result shape requested from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Count,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One filter clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `{field: {operator, value}}`; absent parts are omitted.
    Field {
        field: String,
        operator: Option<String>,
        value: Option<Value>,
    },
    /// `{"and": [...]}`
    And(Vec<Filter>),
    /// `{"or": [...]}`
    Or(Vec<Filter>),
    /// A clause passed through as-is.
    Raw(Value),
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Filter::Field {
            field: field.into(),
            operator: Some(operator.into()),
            value: Some(value.into()),
        }
    }

    /// Condition with an operator but no operand, e.g. `exists`.
    pub fn unary(field: impl Into<String>, operator: impl Into<String>) -> Self {
        Filter::Field {
            field: field.into(),
            operator: Some(operator.into()),
            value: None,
        }
    }

    /// Combine with another filter under `and`, flattening nested `and`s.
    pub fn and(self, other: impl Into<Filter>) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other.into());
                Filter::And(filters)
            }
            first => Filter::And(vec![first, other.into()]),
        }
    }

    /// Combine with another filter under `or`, flattening nested `or`s.
    pub fn or(self, other: impl Into<Filter>) -> Self {
        match self {
            Filter::Or(mut filters) => {
                filters.push(other.into());
                Filter::Or(filters)
            }
            first => Filter::Or(vec![first, other.into()]),
        }
    }
}

impl From<&str> for Filter {
    fn from(field: &str) -> Self {
        Filter::from(field.to_string())
    }
}

impl From<String> for Filter {
    fn from(field: String) -> Self {
        Filter::Field {
            field,
            operator: None,
            value: None,
        }
    }
}

/// `(field, value)` filters on equality.
impl<F, V> From<(F, V)> for Filter
where
    F: Into<String>,
    V: Into<Value>,
{
    fn from((field, value): (F, V)) -> Self {
        Filter::new(field, "=", value)
    }
}

/// `(field, operator, value)`
impl<F, O, V> From<(F, O, V)> for Filter
where
    F: Into<String>,
    O: Into<String>,
    V: Into<Value>,
{
    fn from((field, operator, value): (F, O, V)) -> Self {
        Filter::new(field, operator, value)
    }
}

impl From<Value> for Filter {
    fn from(clause: Value) -> Self {
        Filter::Raw(clause)
    }
}

#[derive(Serialize)]
struct Condition<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    operator: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a Value>,
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Filter::Field {
                field,
                operator,
                value,
            } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(
                    field,
                    &Condition {
                        operator: operator.as_deref(),
                        value: value.as_ref(),
                    },
                )?;
                map.end()
            }
            Filter::And(filters) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("and", filters)?;
                map.end()
            }
            Filter::Or(filters) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("or", filters)?;
                map.end()
            }
            Filter::Raw(clause) => clause.serialize(serializer),
        }
    }
}

/// One aggregation clause, serialized as `{field: {name, operator, value}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Field {
        name: String,
        field: String,
        operator: Option<String>,
        value: Option<Value>,
    },
    Raw(Value),
}

impl Aggregation {
    pub fn new(
        name: impl Into<String>,
        field: impl Into<String>,
        operator: impl Into<String>,
    ) -> Self {
        Aggregation::Field {
            name: name.into(),
            field: field.into(),
            operator: Some(operator.into()),
            value: None,
        }
    }

    /// Attach an operator argument, such as a histogram interval.
    pub fn with_value(self, value: impl Into<Value>) -> Self {
        match self {
            Aggregation::Field {
                name,
                field,
                operator,
                ..
            } => Aggregation::Field {
                name,
                field,
                operator,
                value: Some(value.into()),
            },
            raw => raw,
        }
    }
}

/// `(name, field)` aggregates with the server's default operator.
impl<N, F> From<(N, F)> for Aggregation
where
    N: Into<String>,
    F: Into<String>,
{
    fn from((name, field): (N, F)) -> Self {
        Aggregation::Field {
            name: name.into(),
            field: field.into(),
            operator: None,
            value: None,
        }
    }
}

/// `(name, field, operator)`
impl<N, F, O> From<(N, F, O)> for Aggregation
where
    N: Into<String>,
    F: Into<String>,
    O: Into<String>,
{
    fn from((name, field, operator): (N, F, O)) -> Self {
        Aggregation::new(name, field, operator)
    }
}

impl From<Value> for Aggregation {
    fn from(clause: Value) -> Self {
        Aggregation::Raw(clause)
    }
}

#[derive(Serialize)]
struct Metric<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    operator: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a Value>,
}

impl Serialize for Aggregation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Aggregation::Field {
                name,
                field,
                operator,
                value,
            } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(
                    field,
                    &Metric {
                        name,
                        operator: operator.as_deref(),
                        value: value.as_ref(),
                    },
                )?;
                map.end()
            }
            Aggregation::Raw(clause) => clause.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Serialize for Sort {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, &self.direction)?;
        map.end()
    }
}

/// Accumulator for filters, aggregations, sorting and paging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    kind: Option<QueryType>,
    filters: Vec<Filter>,
    sort: Vec<Sort>,
    aggregations: Vec<Aggregation>,
    highlight: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&mut self, filter: impl Into<Filter>) -> &mut Self {
        self.filters.push(filter.into());
        self
    }

    pub fn aggregate(&mut self, aggregation: impl Into<Aggregation>) -> &mut Self {
        self.aggregations.push(aggregation.into());
        self
    }

    /// Append a sort clause. `None` sorts ascending.
    pub fn sort(
        &mut self,
        field: impl Into<String>,
        direction: impl Into<Option<Direction>>,
    ) -> &mut Self {
        self.sort.push(Sort {
            field: field.into(),
            direction: direction.into().unwrap_or_default(),
        });
        self
    }

    /// Ask for the number of matches instead of the matches themselves.
    /// Other clauses are kept and still sent.
    pub fn count(&mut self) -> &mut Self {
        self.kind = Some(QueryType::Count);
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn highlight(&mut self, field: impl Into<String>) -> &mut Self {
        let field = field.into();
        if !self.highlight.contains(&field) {
            self.highlight.push(field);
        }
        self
    }

    pub fn kind(&self) -> Option<QueryType> {
        self.kind
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sort
    }

    pub fn aggregations(&self) -> &[Aggregation] {
        &self.aggregations
    }

    pub fn highlights(&self) -> &[String] {
        &self.highlight
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl Serialize for QueryBuilder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Query", 7)?;
        match &self.kind {
            Some(kind) => state.serialize_field("type", kind)?,
            None => state.skip_field("type")?,
        }
        if self.filters.is_empty() {
            state.skip_field("filter")?;
        } else {
            state.serialize_field("filter", &self.filters)?;
        }
        if self.sort.is_empty() {
            state.skip_field("sort")?;
        } else {
            state.serialize_field("sort", &self.sort)?;
        }
        if self.aggregations.is_empty() {
            state.skip_field("aggregation")?;
        } else {
            state.serialize_field("aggregation", &self.aggregations)?;
        }
        if self.highlight.is_empty() {
            state.skip_field("highlight")?;
        } else {
            state.serialize_field("highlight", &self.highlight)?;
        }
        match &self.limit {
            Some(limit) => state.serialize_field("limit", limit)?,
            None => state.skip_field("limit")?,
        }
        match &self.offset {
            Some(offset) => state.serialize_field("offset", offset)?,
            None => state.skip_field("offset")?,
        }
        state.end()
    }
}
