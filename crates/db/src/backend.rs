use async_trait::async_trait;
use vitrina_events::ChangeBus;

use crate::error::DataError;
use crate::query::{Filter, Row, Select};

/// Table declaration contributed by a content module.
///
/// Hosted backends enforce their own schema; the in-memory backend uses
/// these to reject duplicate values in unique columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub unique: &'static [&'static str],
}

impl TableSpec {
    pub const fn new(name: &'static str) -> Self {
        Self { name, unique: &[] }
    }

    pub const fn unique(name: &'static str, unique: &'static [&'static str]) -> Self {
        Self { name, unique }
    }
}

/// Per-table select/insert/update/delete plus a change-notification stream.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    async fn select(&self, query: &Select) -> Result<Vec<Row>, DataError>;

    /// Insert rows and return them as stored (with generated columns).
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, DataError>;

    /// Merge `patch` into every row matching `filters`; returns the updated rows.
    async fn update(
        &self,
        table: &str,
        patch: Row,
        filters: &[Filter],
    ) -> Result<Vec<Row>, DataError>;

    /// Physically remove matching rows; returns how many were removed.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, DataError>;

    /// Change notifications for writes on this backend.
    fn changes(&self) -> &ChangeBus;
}
