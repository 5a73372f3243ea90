//! JSON Lines snapshots of a [`MemoryStore`], one item per line.

use std::path::Path;

use mm_core::Entity;
use tracing::info;

use super::{MemoryStore, StoreError};

impl MemoryStore {
    /// Write every item to `path` in key order, replacing the file.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Other` if the directory or file cannot be written.
    pub async fn save_snapshot(&self, path: &Path) -> Result<usize, StoreError> {
        let items = self.items().await;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Other(e.into()))?;
        }
        serde_jsonlines::write_json_lines(path, &items).map_err(|e| StoreError::Other(e.into()))?;
        info!(path = %path.display(), count = items.len(), "saved table snapshot");
        Ok(items.len())
    }

    /// Load a store from `path`. A missing file is an empty table.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Other` on I/O or parse failure, and
    /// `StoreError::MissingKey` for a line without `PK`/`SK`.
    pub fn load_snapshot(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let items = serde_jsonlines::json_lines::<Entity, _>(path)
            .map_err(|e| StoreError::Other(e.into()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Other(e.into()))?;
        info!(path = %path.display(), count = items.len(), "loaded table snapshot");
        Self::with_items(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{GetOptions, KeyValueStore};
    use mm_core::ItemKey;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn snapshot_survives_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("table.jsonl");

        let store = MemoryStore::new();
        let item = Entity::try_from(json!({
            "PK": "USER#1",
            "SK": "PROFILE",
            "profile": {"firstName": "Ada", "culturalBackground": ["a", "b"]},
            "version": 3
        }))
        .unwrap();
        store.put_item(item.clone(), None).await.unwrap();
        assert_eq!(store.save_snapshot(&path).await.unwrap(), 1);

        let reloaded = MemoryStore::load_snapshot(&path).unwrap();
        let got = reloaded
            .get_item(&ItemKey::new("USER#1", "PROFILE"), &GetOptions::default())
            .await
            .unwrap();
        assert_eq!(got, Some(item));
    }

    #[test]
    fn missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::load_snapshot(&dir.path().join("absent.jsonl")).unwrap();
        assert!(store.metrics().snapshot().requests == 0);
    }

    #[test]
    fn keyless_line_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"PK\":\"USER#1\"}\n").unwrap();
        assert!(matches!(
            MemoryStore::load_snapshot(&path),
            Err(StoreError::MissingKey)
        ));
    }
}
