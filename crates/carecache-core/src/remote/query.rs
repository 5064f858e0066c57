use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::normalize_phone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    ArrayContains,
}

impl FilterOp {
    fn token(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::NotEq => "ne",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::In => "in",
            FilterOp::ArrayContains => "contains",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    /// `field:value` for equality, `field:op:value` otherwise.
    fn fingerprint(&self) -> String {
        let value = match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match self.op {
            FilterOp::Eq => format!("{}:{}", self.field, value),
            op => format!("{}:{}:{}", self.field, op.token(), value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Asc,
    Desc,
}

/// A conjunction of filters with optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub filters: Vec<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<(String, Direction)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Records for one calendar day, keyed by ISO date.
    pub fn on_date(date: NaiveDate) -> Self {
        Self::new().filter(Filter::eq("date", date.format("%Y-%m-%d").to_string()))
    }

    /// Documents with the given phone number, in normalised form so that
    /// differently formatted inputs share one cache entry.
    pub fn by_phone(phone: &str) -> Self {
        Self::new().filter(Filter::eq("phone", normalize_phone(phone)))
    }

    pub fn by_field(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().filter(Filter::eq(field, value))
    }

    /// Deterministic cache-key suffix.
    ///
    /// Filters are sorted first, so the order they were added in does not
    /// matter: the same logical query always maps to the same key.
    pub fn fingerprint(&self) -> String {
        let mut parts: Vec<String> = self.filters.iter().map(Filter::fingerprint).collect();
        parts.sort();
        if let Some((field, direction)) = &self.order_by {
            let dir = match direction {
                Direction::Asc => "asc",
                Direction::Desc => "desc",
            };
            parts.push(format!("order:{}:{}", field, dir));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit:{}", limit));
        }
        if parts.is_empty() {
            return "everything".to_string();
        }
        parts.join("|")
    }
}
