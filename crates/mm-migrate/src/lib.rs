//! # mm-migrate
//!
//! Batch migration of relational MADMall data into the single table.
//!
//! A [`MigrationPlan`] lists [`MigrationMapping`]s in order. The
//! [`MigrationEngine`] pages each mapping's rows out of a [`DataSource`],
//! maps them to entities, validates them, and batch-writes the survivors
//! through any [`mm_db::KeyValueStore`], reporting [`MigrationEvent`]s to
//! a [`ProgressSink`] as it goes.

pub mod defaults;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod plan;
pub mod progress;
pub mod result;
pub mod source;

pub use defaults::madmall_plan;
pub use engine::{CancelHandle, EngineState, MigrationConfig, MigrationEngine};
pub use error::{MigrationError, SourceError};
pub use mapping::{FieldMapping, MigrationMapping, SourceSpec};
pub use plan::{MigrationPlan, PlanHook, RollbackPlan};
pub use progress::{MigrationEvent, MigrationPhase, MigrationProgress, NullSink, ProgressSink};
pub use result::{ErrorKind, MigrationResult, RecordError};
pub use source::{ColumnInfo, DataSource, MemorySource, Row, SqliteDataSource};
