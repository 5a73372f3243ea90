//! Relational source configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// Path of the SQLite database file.
    #[serde(default)]
    pub file_path: String,
}

impl SourceConfig {
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        !self.file_path.is_empty()
    }
}
