//! DAO contracts over the in-process store:
//! - duplicate creates leave a single item
//! - optimistic locking rejects stale writers
//! - batch calls respect store ceilings
//! - snapshots survive a save/load cycle

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

use mm_core::{Entity, EntityType, ItemKey, WriteKind};
use mm_db::{
    Condition, Dao, DatabaseError, DeleteOptions, GetOptions, KeyValueStore, MemoryStore,
    QueryOptions, QueryResult, StoreError, TransactionItem, UpdateOptions, UpdateRequest, UserDao,
};

fn user(id: &str) -> Entity {
    Entity::try_from(json!({
        "PK": format!("USER#{id}"),
        "SK": "PROFILE",
        "userId": id,
        "email": format!("{id}@example.com"),
        "profile": {
            "firstName": "Test",
            "lastName": "User",
            "culturalBackground": [],
            "supportNeeds": []
        },
        "preferences": {},
        "settings": { "theme": "dark" },
        "isVerified": false,
        "isActive": true
    }))
    .unwrap()
}

fn user_dao() -> (Arc<MemoryStore>, Dao<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (Arc::clone(&store), Dao::new(store, EntityType::User))
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn racing_creates_leave_one_item() {
    let (store, dao) = user_dao();

    let (a, b) = tokio::join!(dao.create(user("u1")), dao.create(user("u1")));
    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    assert!(matches!(
        a.err().or(b.err()),
        Some(DatabaseError::DuplicateKey { .. })
    ));
    assert_eq!(store.len().await, 1);
}

// ---------------------------------------------------------------------------
// Optimistic locking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_writer_gets_a_conflict() {
    let (_, dao) = user_dao();
    dao.create(user("u1")).await.unwrap();

    let pinned = |version| UpdateOptions {
        expected_version: Some(version),
        ..UpdateOptions::default()
    };
    dao.update("USER#u1", "PROFILE", Entity::new().with("isVerified", true), pinned(1))
        .await
        .unwrap();
    let err = dao
        .update("USER#u1", "PROFILE", Entity::new().with("isActive", false), pinned(1))
        .await
        .unwrap_err();

    assert!(matches!(err, DatabaseError::Conflict { expected: 1, .. }));
    let stored = dao
        .get_by_id("USER#u1", "PROFILE", &GetOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.version(), Some(2));
    assert_eq!(stored.get("isVerified"), Some(&json!(true)));
    assert_eq!(stored.get("isActive"), Some(&json!(true)));
}

#[tokio::test]
async fn concurrent_updates_serialise_through_versions() {
    let (_, dao) = user_dao();
    dao.create(user("u1")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let dao = dao.clone();
        handles.push(tokio::spawn(async move {
            let opts = UpdateOptions {
                expected_version: Some(1),
                ..UpdateOptions::default()
            };
            dao.update("USER#u1", "PROFILE", Entity::new().with("writer", i), opts)
                .await
        }));
    }
    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(DatabaseError::Conflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// Records the size of every batch call before handing it to memory.
#[derive(Default)]
struct ChunkLog {
    inner: MemoryStore,
    gets: Mutex<Vec<usize>>,
    writes: Mutex<Vec<usize>>,
}

#[async_trait]
impl KeyValueStore for ChunkLog {
    async fn put_item(&self, item: Entity, condition: Option<Condition>) -> Result<(), StoreError> {
        self.inner.put_item(item, condition).await
    }

    async fn get_item(
        &self,
        key: &ItemKey,
        options: &GetOptions,
    ) -> Result<Option<Entity>, StoreError> {
        self.inner.get_item(key, options).await
    }

    async fn update_item(
        &self,
        key: &ItemKey,
        request: UpdateRequest,
    ) -> Result<Option<Entity>, StoreError> {
        self.inner.update_item(key, request).await
    }

    async fn delete_item(
        &self,
        key: &ItemKey,
        options: DeleteOptions,
    ) -> Result<Option<Entity>, StoreError> {
        self.inner.delete_item(key, options).await
    }

    async fn query(&self, kce: &str, options: &QueryOptions) -> Result<QueryResult, StoreError> {
        self.inner.query(kce, options).await
    }

    async fn batch_get(
        &self,
        keys: &[ItemKey],
        options: &GetOptions,
    ) -> Result<Vec<Entity>, StoreError> {
        self.gets.lock().unwrap().push(keys.len());
        self.inner.batch_get(keys, options).await
    }

    async fn batch_write(&self, items: Vec<Entity>, kind: WriteKind) -> Result<(), StoreError> {
        self.writes.lock().unwrap().push(items.len());
        self.inner.batch_write(items, kind).await
    }

    async fn transaction(&self, items: Vec<TransactionItem>) -> Result<(), StoreError> {
        self.inner.transaction(items).await
    }

    async fn count(&self, kce: &str, options: &QueryOptions) -> Result<usize, StoreError> {
        self.inner.count(kce, options).await
    }
}

#[tokio::test]
async fn batch_get_chunks_by_one_hundred() {
    let store = Arc::new(ChunkLog::default());
    let dao = Dao::new(Arc::clone(&store), EntityType::User);
    let keys: Vec<_> = (0..250)
        .map(|i| ItemKey::new(format!("USER#u{i}"), "PROFILE"))
        .collect();

    let found = dao.batch_get(&keys, &GetOptions::default()).await.unwrap();
    assert!(found.is_empty());
    assert_eq!(*store.gets.lock().unwrap(), vec![100, 100, 50]);
}

#[tokio::test]
async fn batch_write_chunks_by_twenty_five() {
    let store = Arc::new(ChunkLog::default());
    let dao = Dao::new(Arc::clone(&store), EntityType::User);
    let items = (0..60)
        .map(|i| {
            user(&format!("u{i}"))
                .with("entityType", "USER")
                .with("version", 1)
                .with("createdAt", "2024-03-01T09:00:00.000Z")
                .with("updatedAt", "2024-03-01T09:00:00.000Z")
        })
        .collect();

    dao.batch_write(items).await.unwrap();
    assert_eq!(*store.writes.lock().unwrap(), vec![25, 25, 10]);
    assert_eq!(store.inner.len().await, 60);
}

#[tokio::test]
async fn oversized_transaction_never_reaches_the_store() {
    let (store, dao) = user_dao();
    let items = (0..26)
        .map(|i| TransactionItem::Put {
            item: user(&format!("u{i}")),
            condition: None,
        })
        .collect();

    let err = dao.transaction(items).await.unwrap_err();
    assert_eq!(err.to_string(), "Transaction cannot contain more than 25 items");
    assert_eq!(store.metrics().snapshot().requests, 0);
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_round_trip_keeps_indexes_queryable() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("table.jsonl");

    let store = Arc::new(MemoryStore::new());
    let users = UserDao::new(Arc::clone(&store));
    for id in ["u1", "u2"] {
        let mut input = user(id);
        input.remove("PK");
        input.remove("SK");
        users.create_user(input).await.unwrap();
    }
    assert_eq!(store.save_snapshot(&path).await.unwrap(), 2);

    let reloaded = UserDao::new(Arc::new(MemoryStore::load_snapshot(&path).unwrap()));
    let found = reloaded.get_by_email("u2@example.com").await.unwrap().unwrap();
    assert_eq!(found.str_attr("userId"), Some("u2"));
}
