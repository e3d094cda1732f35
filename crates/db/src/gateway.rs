use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use vitrina_events::{ChangeBus, ChannelSpec, Subscription};

use crate::backend::TableBackend;
use crate::error::DataError;
use crate::query::{Filter, Row, Select};
use crate::retry::{with_retry, RetryPolicy};

/// Single entry point for every outbound table call.
///
/// Built once at startup and handed to each module; clones share the same
/// backend connection.
#[derive(Clone)]
pub struct Gateway {
    backend: Arc<dyn TableBackend>,
    retry: RetryPolicy,
}

impl Gateway {
    pub fn new(backend: Arc<dyn TableBackend>, retry: RetryPolicy) -> Self {
        tracing::info!(
            backend = backend.name(),
            max_retries = retry.max_retries(),
            base_delay_ms = retry.base_delay_ms(),
            "gateway ready"
        );
        Self { backend, retry }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn changes(&self) -> &ChangeBus {
        self.backend.changes()
    }

    pub async fn select(&self, query: &Select) -> Result<Vec<Row>, DataError> {
        let rows = with_retry(&self.retry, || self.backend.select(query)).await?;
        tracing::debug!(table = %query.table, rows = rows.len(), "select");
        Ok(rows)
    }

    /// Select and decode every row into `T`.
    pub async fn select_as<T: DeserializeOwned>(&self, query: &Select) -> Result<Vec<T>, DataError> {
        self.select(query).await?.into_iter().map(decode).collect()
    }

    /// Fetch exactly one row; an empty result is `NotFound`.
    pub async fn select_one(
        &self,
        query: &Select,
        entity: &str,
        key: &str,
    ) -> Result<Row, DataError> {
        let query = query.clone().limit(1);
        self.select(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DataError::not_found(entity, key))
    }

    /// Insert one row. Not retried: a repeated insert is not idempotent.
    pub async fn insert(&self, table: &str, row: Row) -> Result<Row, DataError> {
        self.insert_many(table, vec![row])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DataError::internal(format!("insert into {table} returned no row")))
    }

    pub async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, DataError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let stored = self.backend.insert(table, rows).await?;
        tracing::debug!(table, rows = stored.len(), "insert");
        Ok(stored)
    }

    pub async fn update(
        &self,
        table: &str,
        patch: Row,
        filters: &[Filter],
    ) -> Result<Vec<Row>, DataError> {
        let rows = with_retry(&self.retry, || {
            self.backend.update(table, patch.clone(), filters)
        })
        .await?;
        tracing::debug!(table, rows = rows.len(), "update");
        Ok(rows)
    }

    /// Update by key; zero matching rows is `NotFound`.
    pub async fn update_one(
        &self,
        table: &str,
        patch: Row,
        filters: &[Filter],
        entity: &str,
        key: &str,
    ) -> Result<Row, DataError> {
        self.update(table, patch, filters)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DataError::not_found(entity, key))
    }

    pub async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, DataError> {
        let removed = with_retry(&self.retry, || self.backend.delete(table, filters)).await?;
        tracing::debug!(table, removed, "delete");
        Ok(removed)
    }

    /// Open a change subscription; `on_change` runs once per qualifying event.
    pub fn subscribe<F>(&self, spec: ChannelSpec, on_change: F) -> Result<Subscription, DataError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Ok(self.backend.changes().subscribe(spec, Arc::new(on_change))?)
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("backend", &self.backend.name())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Decode one backend row into a typed record.
pub fn decode<T: DeserializeOwned>(row: Row) -> Result<T, DataError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}
