//! In-process table store used for local runs and tests.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use uuid::Uuid;
use vitrina_events::{ChangeBus, ChangeEvent, ChangeKind};

use crate::backend::{TableBackend, TableSpec};
use crate::error::DataError;
use crate::query::{Embed, Filter, Order, Relation, Row, Select};

const UNIQUE_VIOLATION: &str = "23505";

/// Table store kept entirely in memory.
///
/// Behaves like the hosted backend for everything the content layer relies
/// on: generated `id`/`created_at`, unique columns, embedded relations,
/// ordering, and one change event per write that touched rows.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    unique: RwLock<HashMap<String, Vec<String>>>,
    failures: Mutex<VecDeque<DataError>>,
    write_failures: Mutex<HashMap<String, VecDeque<DataError>>>,
    calls: AtomicUsize,
    changes: ChangeBus,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(specs: &[TableSpec]) -> Self {
        let backend = Self::new();
        for spec in specs {
            backend.define_table(spec);
        }
        backend
    }

    pub fn define_table(&self, spec: &TableSpec) {
        self.tables.write().entry(spec.name.to_string()).or_default();
        self.unique.write().insert(
            spec.name.to_string(),
            spec.unique.iter().map(|c| c.to_string()).collect(),
        );
        tracing::debug!(table = spec.name, unique = ?spec.unique, "table defined");
    }

    /// Make the next `count` operations fail with a transient error.
    pub fn fail_next(&self, count: usize) {
        let mut failures = self.failures.lock();
        for _ in 0..count {
            failures.push_back(DataError::transient("injected connection reset"));
        }
    }

    /// Make the next operation fail with `error`.
    pub fn fail_next_with(&self, error: DataError) {
        self.failures.lock().push_back(error);
    }

    /// Make the next write (insert, update or delete) on `table` fail with
    /// `error`. Reads and other tables are unaffected, so one step of a
    /// multi-table write can be broken on its own.
    pub fn fail_write_with(&self, table: &str, error: DataError) {
        self.write_failures
            .lock()
            .entry(table.to_string())
            .or_default()
            .push_back(error);
    }

    /// Number of operations issued against this backend, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// Raw rows of a table, unshaped.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    fn begin(&self) -> Result<(), DataError> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        match self.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn begin_write(&self, table: &str) -> Result<(), DataError> {
        self.begin()?;
        match self
            .write_failures
            .lock()
            .get_mut(table)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn unique_columns(&self, table: &str) -> Vec<String> {
        let mut columns = vec!["id".to_string()];
        if let Some(declared) = self.unique.read().get(table) {
            columns.extend(declared.iter().cloned());
        }
        columns
    }

    fn publish(&self, table: &str, kind: ChangeKind, rows: usize) {
        if rows > 0 {
            self.changes.publish(ChangeEvent::new(table, kind, rows));
        }
    }
}

fn check_unique<'a>(
    table: &str,
    columns: &[String],
    candidate: &Row,
    others: impl Iterator<Item = &'a Row> + Clone,
) -> Result<(), DataError> {
    for column in columns {
        let value = match candidate.get(column) {
            Some(value) if !value.is_null() => value,
            _ => continue,
        };
        if others.clone().any(|row| row.get(column) == Some(value)) {
            return Err(DataError::constraint(
                UNIQUE_VIOLATION,
                format!("duplicate key value violates unique constraint \"{table}_{column}_key\""),
            ));
        }
    }
    Ok(())
}

fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x.cmp(y),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

fn sort_rows(rows: &mut [Row], order: &[Order]) {
    rows.sort_by(|a, b| {
        order.iter().fold(Ordering::Equal, |acc, key| {
            acc.then_with(|| {
                let ordering = compare_values(
                    a.get(&key.column).unwrap_or(&Value::Null),
                    b.get(&key.column).unwrap_or(&Value::Null),
                );
                if key.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            })
        })
    });
}

fn shape(tables: &HashMap<String, Vec<Row>>, row: &Row, columns: &[String], embeds: &[Embed]) -> Row {
    let mut out = if (columns.is_empty() && embeds.is_empty()) || columns.iter().any(|c| c == "*") {
        row.clone()
    } else {
        columns
            .iter()
            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
            .collect()
    };

    for embed in embeds {
        let related = tables.get(&embed.table);
        let value = match &embed.relation {
            Relation::HasMany { foreign_key } => {
                let parent = row.get("id").unwrap_or(&Value::Null);
                let children = related
                    .into_iter()
                    .flatten()
                    .filter(|child| !parent.is_null() && child.get(foreign_key) == Some(parent))
                    .map(|child| Value::Object(shape(tables, child, &embed.columns, &embed.embeds)))
                    .collect();
                Value::Array(children)
            }
            Relation::BelongsTo { local_key } => match row.get(local_key) {
                Some(key) if !key.is_null() => related
                    .into_iter()
                    .flatten()
                    .find(|target| target.get("id") == Some(key))
                    .map(|target| Value::Object(shape(tables, target, &embed.columns, &embed.embeds)))
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            },
        };
        out.insert(embed.key().to_string(), value);
    }

    out
}

#[async_trait]
impl TableBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn select(&self, query: &Select) -> Result<Vec<Row>, DataError> {
        self.begin()?;
        let tables = self.tables.read();
        let mut rows: Vec<Row> = tables
            .get(&query.table)
            .into_iter()
            .flatten()
            .filter(|row| query.filters.iter().all(|f| f.matches(row)))
            .cloned()
            .collect();

        sort_rows(&mut rows, &query.order);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows
            .iter()
            .map(|row| shape(&tables, row, &query.columns, &query.embeds))
            .collect())
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, DataError> {
        self.begin_write(table)?;
        let unique = self.unique_columns(table);
        let mut tables = self.tables.write();
        let existing = tables.entry(table.to_string()).or_default();

        let mut stored: Vec<Row> = Vec::with_capacity(rows.len());
        for mut row in rows {
            if row.get("id").map_or(true, Value::is_null) {
                row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
            }
            if row.get("created_at").map_or(true, Value::is_null) {
                row.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
            }
            check_unique(table, &unique, &row, existing.iter().chain(stored.iter()))?;
            stored.push(row);
        }

        existing.extend(stored.iter().cloned());
        drop(tables);

        self.publish(table, ChangeKind::Insert, stored.len());
        Ok(stored)
    }

    async fn update(
        &self,
        table: &str,
        patch: Row,
        filters: &[Filter],
    ) -> Result<Vec<Row>, DataError> {
        self.begin_write(table)?;
        let unique = self.unique_columns(table);
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if !filters.iter().all(|f| f.matches(row)) {
                continue;
            }
            let mut candidate = row.clone();
            for (key, value) in &patch {
                if key != "id" {
                    candidate.insert(key.clone(), value.clone());
                }
            }
            let others = rows
                .iter()
                .enumerate()
                .filter(move |(i, _)| *i != index)
                .map(|(_, r)| r);
            check_unique(table, &unique, &candidate, others)?;
            updated.push((index, candidate));
        }

        for (index, candidate) in &updated {
            rows[*index] = candidate.clone();
        }
        drop(tables);

        self.publish(table, ChangeKind::Update, updated.len());
        Ok(updated.into_iter().map(|(_, row)| row).collect())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, DataError> {
        self.begin_write(table)?;
        let mut tables = self.tables.write();
        let removed = match tables.get_mut(table) {
            Some(rows) => {
                let before = rows.len();
                rows.retain(|row| !filters.iter().all(|f| f.matches(row)));
                before - rows.len()
            }
            None => 0,
        };
        drop(tables);

        self.publish(table, ChangeKind::Delete, removed);
        Ok(removed as u64)
    }

    fn changes(&self) -> &ChangeBus {
        &self.changes
    }
}
