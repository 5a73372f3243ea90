//! SQLite source over `libsql`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use libsql::Builder;
use serde_json::{Number, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::{ColumnInfo, DataSource, Row};
use crate::error::SourceError;

struct Connected {
    // Dropping the database closes its connections.
    _db: libsql::Database,
    conn: libsql::Connection,
}

/// A local SQLite file (or `:memory:`) read through libSQL.
pub struct SqliteDataSource {
    path: PathBuf,
    state: RwLock<Option<Connected>>,
}

impl SqliteDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a statement that returns no rows (fixtures, setup).
    ///
    /// # Errors
    ///
    /// `NotConnected` before `connect()`, or the libSQL failure.
    pub async fn execute(&self, sql: &str) -> Result<u64, SourceError> {
        let state = self.state.read().await;
        let connected = state.as_ref().ok_or(SourceError::NotConnected)?;
        Ok(connected.conn.execute(sql, ()).await?)
    }

    /// # Errors
    ///
    /// `NotConnected` before `connect()`, or the libSQL failure.
    pub async fn table_exists(&self, table_name: &str) -> Result<bool, SourceError> {
        Ok(self.table_names().await?.iter().any(|t| t == table_name))
    }

    /// Columns of `table_name`, in declaration order.
    ///
    /// # Errors
    ///
    /// `NotConnected` before `connect()`, or the libSQL failure.
    pub async fn table_schema(&self, table_name: &str) -> Result<Vec<ColumnInfo>, SourceError> {
        let rows = self
            .query(&format!("PRAGMA table_info({})", quote_ident(table_name)))
            .await?;
        Ok(rows
            .iter()
            .map(|row| ColumnInfo {
                name: text(row, "name"),
                data_type: text(row, "type"),
                not_null: flag(row, "notnull"),
                primary_key: flag(row, "pk"),
            })
            .collect())
    }

    /// First `limit` rows of `table_name`.
    ///
    /// # Errors
    ///
    /// `NotConnected` before `connect()`, or the libSQL failure.
    pub async fn sample_rows(
        &self,
        table_name: &str,
        limit: usize,
    ) -> Result<Vec<Row>, SourceError> {
        self.query(&format!("SELECT * FROM {} LIMIT {limit}", quote_ident(table_name)))
            .await
    }
}

#[async_trait]
impl DataSource for SqliteDataSource {
    async fn connect(&self) -> Result<(), SourceError> {
        let mut state = self.state.write().await;
        if state.is_some() {
            return Ok(());
        }
        let db = Builder::new_local(&self.path).build().await?;
        let conn = db.connect()?;
        *state = Some(Connected { _db: db, conn });
        debug!(path = %self.path.display(), "sqlite source connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SourceError> {
        if self.state.write().await.take().is_some() {
            debug!(path = %self.path.display(), "sqlite source disconnected");
        }
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, SourceError> {
        let state = self.state.read().await;
        let connected = state.as_ref().ok_or(SourceError::NotConnected)?;

        let mut rows = connected.conn.query(sql, ()).await?;
        let columns: Vec<String> = (0..rows.column_count())
            .map(|i| rows.column_name(i).unwrap_or_default().to_string())
            .collect();

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let mut record = Row::new();
            for (idx, name) in (0_i32..).zip(&columns) {
                record.insert(name.clone(), to_json(row.get_value(idx)?));
            }
            out.push(record);
        }
        Ok(out)
    }

    async fn get_row_count(&self, table_name: &str) -> Result<u64, SourceError> {
        let rows = self
            .query(&format!("SELECT COUNT(*) AS n FROM {}", quote_ident(table_name)))
            .await?;
        rows.first()
            .and_then(|row| row.get("n"))
            .and_then(Value::as_u64)
            .ok_or_else(|| SourceError::Query(format!("no row count for {table_name}")))
    }

    async fn table_names(&self) -> Result<Vec<String>, SourceError> {
        let rows = self
            .query(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .await?;
        Ok(rows.iter().map(|row| text(row, "name")).collect())
    }
}

fn to_json(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null => Value::Null,
        libsql::Value::Integer(n) => Value::from(n),
        libsql::Value::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        libsql::Value::Text(s) => Value::String(s),
        libsql::Value::Blob(bytes) => Value::String(bytes.iter().fold(String::new(), |mut hex, b| {
            let _ = write!(hex, "{b:02x}");
            hex
        })),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn text(row: &Row, column: &str) -> String {
    row.get(column).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn flag(row: &Row, column: &str) -> bool {
    row.get(column).and_then(Value::as_i64).is_some_and(|n| n != 0)
}
