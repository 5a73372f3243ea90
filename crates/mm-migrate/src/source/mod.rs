//! Relational sources the engine extracts from.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SourceError;

pub use memory::MemorySource;
pub use sqlite::SqliteDataSource;

/// One source row, column name to value.
pub type Row = Map<String, Value>;

/// A relational store that answers paged `SELECT`s.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn connect(&self) -> Result<(), SourceError>;

    /// Safe to call when not connected.
    async fn disconnect(&self) -> Result<(), SourceError>;

    async fn query(&self, sql: &str) -> Result<Vec<Row>, SourceError>;

    async fn get_row_count(&self, table_name: &str) -> Result<u64, SourceError>;

    async fn table_names(&self) -> Result<Vec<String>, SourceError>;
}

/// Column description from `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// `SELECT * FROM <table> LIMIT <limit> OFFSET <offset>`.
#[must_use]
pub fn table_page(table: &str, limit: usize, offset: usize) -> String {
    format!("SELECT * FROM {table} LIMIT {limit} OFFSET {offset}")
}

/// `<query> LIMIT <limit> OFFSET <offset>`.
#[must_use]
pub fn query_page(query: &str, limit: usize, offset: usize) -> String {
    format!("{query} LIMIT {limit} OFFSET {offset}")
}
