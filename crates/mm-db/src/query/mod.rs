//! Fluent construction of key-condition, filter, and projection expressions.

pub mod builder;
pub mod condition;
pub mod presets;

pub use builder::{QueryBuilder, QueryError, QueryParams};
pub use condition::{Operator, QueryCondition, SortCondition};
