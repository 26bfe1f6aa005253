// Fetch queries
//
// Filters are domain-specific key/value equality constraints
// (visibility, type, pet_id, ...) plus optional paging and ordering.
// Gateways translate a Query into their own wire format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sort order for a fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    pub descending: bool,
}

/// Backend-agnostic fetch query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Equality filters, field -> expected value (string form)
    #[serde(default)]
    pub filters: BTreeMap<String, String>,

    /// Maximum number of records to return
    #[serde(default)]
    pub limit: Option<usize>,

    /// Number of records to skip
    #[serde(default)]
    pub offset: usize,

    #[serde(default)]
    pub order: Option<SortOrder>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality filter
    pub fn filter(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        self.filters.insert(field.into(), value.to_string());
        self
    }

    /// Add an equality filter when the value is present
    pub fn filter_opt<V: ToString>(self, field: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.filter(field, v),
            None => self,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order = Some(SortOrder {
            field: field.into(),
            descending: true,
        });
        self
    }

    pub fn order_by_asc(mut self, field: impl Into<String>) -> Self {
        self.order = Some(SortOrder {
            field: field.into(),
            descending: false,
        });
        self
    }

    /// Check a JSON record against the equality filters.
    ///
    /// Strings compare by value, other scalars by their JSON text.
    /// A missing or null field never matches.
    pub fn matches(&self, record: &serde_json::Value) -> bool {
        self.filters.iter().all(|(field, expected)| {
            match record.get(field) {
                Some(serde_json::Value::String(s)) => s == expected,
                Some(serde_json::Value::Null) | None => false,
                Some(other) => other.to_string() == *expected,
            }
        })
    }
}
