//! Target table configuration.

use serde::{Deserialize, Serialize};

fn default_table_name() -> String {
    "madmall-data".to_string()
}

fn default_snapshot_path() -> String {
    ".madmall/table.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Logical name of the single table.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// JSON Lines file the in-process table is loaded from and saved to.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = StoreConfig::default();
        assert_eq!(config.table_name, "madmall-data");
        assert_eq!(config.snapshot_path, ".madmall/table.jsonl");
    }
}
