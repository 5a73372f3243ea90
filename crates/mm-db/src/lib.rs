//! # mm-db
//!
//! Single-table data access for MADMall.
//!
//! - [`query`]: placeholder-safe key-condition, filter, and projection
//!   expressions
//! - [`store`]: the [`KeyValueStore`] seam and the in-process [`MemoryStore`]
//! - [`dao`]: the generic [`Dao`] with optimistic locking, plus typed DAOs
//!
//! ```no_run
//! # async fn demo() -> Result<(), mm_db::DatabaseError> {
//! use std::sync::Arc;
//! use mm_db::{MemoryStore, UserDao};
//!
//! let users = UserDao::new(Arc::new(MemoryStore::new()));
//! let ada = users.get_by_email("ada@example.com").await?;
//! # let _ = ada;
//! # Ok(())
//! # }
//! ```

pub mod dao;
pub mod error;
pub mod query;
pub mod store;

mod test_support;

pub use dao::{CircleDao, CircleSearch, Dao, UpdateOptions, UserDao, UserSearch};
pub use error::DatabaseError;
pub use query::{QueryBuilder, QueryError, QueryParams};
pub use store::{
    Condition, DeleteOptions, GetOptions, KeyValueStore, MemoryStore, QueryOptions, QueryResult,
    ReturnValues, StoreError, TransactionItem, UpdateRequest,
};
