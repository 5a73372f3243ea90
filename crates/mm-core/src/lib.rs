//! # mm-core
//!
//! Core types for the MADMall single-table data layer.
//!
//! This crate provides the foundational types shared across all MADMall crates:
//! - `Entity`, the attribute map persisted in the single table
//! - Entity-type and secondary-index enums
//! - Key pattern helpers for every access pattern
//! - ISO-8601 timestamp helpers matching the stored format
//! - Cross-cutting error types

pub mod entity;
pub mod enums;
pub mod errors;
pub mod keys;
pub mod timestamps;

pub use entity::{Entity, ItemKey};
pub use enums::{EntityType, Gsi, WriteKind};
pub use errors::CoreError;
