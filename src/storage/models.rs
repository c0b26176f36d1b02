//! Data models for the storage layer

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One unit of collected data: field name to arbitrary JSON value.
pub type ResourceRow = serde_json::Map<String, serde_json::Value>;

/// Summary per resource kind, ordered by kind name.
pub type SummaryMap = BTreeMap<String, Summary>;

/// A record to persist into the schema named by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub kind: String,
    pub fields: ResourceRow,
}

impl Record {
    pub fn new(kind: impl Into<String>, fields: ResourceRow) -> Self {
        Self {
            kind: kind.into(),
            fields,
        }
    }
}

/// Aggregate of the data collected for one resource kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Summary {
    /// Number of collected rows
    #[schema(example = 12)]
    pub resource_count: i64,
    /// Sum of the `price_per_month` field across rows
    #[schema(example = 431.5)]
    pub total_spent: f64,
    /// Latest collection timestamp (RFC 3339)
    #[schema(example = "2025-01-11T00:00:00+00:00")]
    pub last_collected_at: Option<String>,
}
