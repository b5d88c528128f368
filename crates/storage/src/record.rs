use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{OffsetDateTime, UtcOffset};

/// Field map of a single record, keyed by column name.
pub type Fields = serde_json::Map<String, Value>;

/// A single row as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    /// ISO 8601 / RFC 3339 timestamp string assigned by the store.
    #[serde(rename = "createdTime", default)]
    pub created_time: String,
    #[serde(default)]
    pub fields: Fields,
}

impl Record {
    /// Borrow a field value, treating JSON `null` as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// Fixed width and always UTC, so string order is chronological order.
pub fn format_timestamp(t: OffsetDateTime) -> String {
    let t = t.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        t.year(),
        t.month() as u8,
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
        t.millisecond()
    )
}

/// Row filter understood by every backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value. A list-valued field matches when it contains
    /// the value (linked-record semantics).
    Eq(String, Value),
    /// Field is missing, null, an empty string, or an empty list.
    Blank(String),
    /// Field is greater than or equal to the value.
    Gte(String, Value),
    /// Field is less than or equal to the value.
    Lte(String, Value),
    /// Every sub-filter matches.
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn blank(field: impl Into<String>) -> Self {
        Filter::Blank(field.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gte(field.into(), value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lte(field.into(), value.into())
    }

    /// Conjoin two filters, flattening nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        let mut parts = match self {
            Filter::And(parts) => parts,
            single => vec![single],
        };
        match other {
            Filter::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        Filter::And(parts)
    }

    /// Evaluate the filter against a record's fields.
    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::Eq(field, expected) => match fields.get(field) {
                Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
                Some(actual) => values_equal(actual, expected),
                None => false,
            },
            Filter::Blank(field) => match fields.get(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(Value::Array(items)) => items.is_empty(),
                Some(_) => false,
            },
            Filter::Gte(field, bound) => fields
                .get(field)
                .and_then(|v| compare_values(v, bound))
                .is_some_and(|ord| ord != Ordering::Less),
            Filter::Lte(field, bound) => fields
                .get(field)
                .and_then(|v| compare_values(v, bound))
                .is_some_and(|ord| ord != Ordering::Greater),
            Filter::And(parts) => parts.iter().all(|p| p.matches(fields)),
        }
    }
}

/// Sort direction for a single-field sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// One-field sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// A filtered, optionally sorted and limited table scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Filter>,
    pub sort: Option<Sort>,
    /// Maximum number of records to return. `None` = no limit.
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Order two scalar values. Numbers compare numerically, strings
/// lexicographically, booleans false < true. Mixed kinds are unordered.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
