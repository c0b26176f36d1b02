//! The storage contract consumed by the HTTP layer

use crate::error::StorageError;

use super::models::{Record, ResourceRow, SummaryMap};

/// Read/write capability set the server depends on.
///
/// Schemas are addressed by an explicit kind name (for example `"ec2"`).
/// Implementations synchronize internally; the server shares one instance
/// across all request tasks behind an `Arc`.
pub trait Storage: Send + Sync {
    /// Persist one record into the schema named by `record.kind`.
    fn create(&self, record: &Record) -> Result<(), StorageError>;

    /// Make the schema for `kind` available for writes. Idempotent.
    fn ensure_schema(&self, kind: &str) -> Result<(), StorageError>;

    /// Remove the schema for `kind`. Absent schemas are a no-op.
    fn drop_schema(&self, kind: &str) -> Result<(), StorageError>;

    /// Aggregate view across all known resource kinds. Empty map when there is no data.
    fn get_summary(&self) -> Result<SummaryMap, StorageError>;

    /// All rows collected for `kind`, in insertion order. Unknown kinds yield an empty vec.
    fn get_resource_rows(&self, kind: &str) -> Result<Vec<ResourceRow>, StorageError>;
}
