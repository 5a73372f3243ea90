//! In-process source over fixed tables, for tests and demos.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, Mutex, PoisonError};

use async_trait::async_trait;
use regex::Regex;

use super::{DataSource, Row};
use crate::error::SourceError;

static PAGED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.*?)\s+LIMIT\s+(\d+)\s+OFFSET\s+(\d+)\s*$").expect("valid paging regex")
});
static TABLE_SCAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^SELECT\s+\*\s+FROM\s+(\w+)$").expect("valid table scan regex")
});

/// Answers `SELECT * FROM t LIMIT n OFFSET o` and `<named query> LIMIT n
/// OFFSET o`, and records every statement it served.
#[derive(Default)]
pub struct MemorySource {
    tables: BTreeMap<String, Vec<Row>>,
    queries: BTreeMap<String, Vec<Row>>,
    failing: BTreeSet<String>,
    connected: AtomicBool,
    served: Mutex<Vec<String>>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables.insert(name.into(), rows);
        self
    }

    /// Register the result set of a raw query source.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>, rows: Vec<Row>) -> Self {
        self.queries.insert(query.into(), rows);
        self
    }

    /// Make every statement against `table` fail.
    #[must_use]
    pub fn with_failing_table(mut self, table: impl Into<String>) -> Self {
        self.failing.insert(table.into());
        self
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Statements served so far, in order.
    #[must_use]
    pub fn served(&self) -> Vec<String> {
        self.served.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn ensure_connected(&self) -> Result<(), SourceError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SourceError::NotConnected)
        }
    }

    fn table(&self, name: &str) -> Result<&[Row], SourceError> {
        if self.failing.contains(name) {
            return Err(SourceError::Query(format!("table {name} is unavailable")));
        }
        self.tables
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| SourceError::Query(format!("no such table: {name}")))
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn connect(&self) -> Result<(), SourceError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SourceError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, SourceError> {
        self.ensure_connected()?;
        self.served
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.to_string());

        let caps = PAGED
            .captures(sql.trim())
            .ok_or_else(|| SourceError::Query(format!("unsupported statement: {sql}")))?;
        let base = caps[1].trim();
        let bad = |part: &str| SourceError::Query(format!("bad {part} in {sql}"));
        let limit: usize = caps[2].parse().map_err(|_| bad("LIMIT"))?;
        let offset: usize = caps[3].parse().map_err(|_| bad("OFFSET"))?;

        let rows = match TABLE_SCAN.captures(base) {
            Some(table) => self.table(&table[1])?,
            None => self
                .queries
                .get(base)
                .map(Vec::as_slice)
                .ok_or_else(|| SourceError::Query(format!("unknown query: {base}")))?,
        };
        Ok(rows.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn get_row_count(&self, table_name: &str) -> Result<u64, SourceError> {
        self.ensure_connected()?;
        Ok(self.table(table_name)?.len() as u64)
    }

    async fn table_names(&self) -> Result<Vec<String>, SourceError> {
        self.ensure_connected()?;
        Ok(self.tables.keys().cloned().collect())
    }
}
