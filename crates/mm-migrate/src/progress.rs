//! Live progress and the events the engine emits.

use chrono::{DateTime, Utc};
use mm_core::EntityType;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::result::MigrationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    Extracting,
    Transforming,
    Validating,
    Loading,
    Completed,
    Failed,
}

impl MigrationPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extracting => "extracting",
            Self::Transforming => "transforming",
            Self::Validating => "validating",
            Self::Loading => "loading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Progress of one entity type's migration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationProgress {
    pub entity_type: EntityType,
    pub phase: MigrationPhase,
    /// Zero when the source cannot report a count.
    pub total_records: u64,
    pub processed_records: u64,
    pub current_batch: u64,
    pub total_batches: u64,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
    /// Records per second since `start_time`.
    pub throughput: f64,
    pub errors: usize,
}

impl MigrationProgress {
    #[must_use]
    pub fn start(entity_type: EntityType, total_records: u64, batch_size: usize) -> Self {
        Self {
            entity_type,
            phase: MigrationPhase::Extracting,
            total_records,
            processed_records: 0,
            current_batch: 0,
            total_batches: total_records.div_ceil(batch_size.max(1) as u64),
            start_time: Utc::now(),
            estimated_completion: None,
            throughput: 0.0,
            errors: 0,
        }
    }
}

/// Everything the engine reports while it runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum MigrationEvent {
    ProgressUpdate(MigrationProgress),
    EntityCompleted(MigrationResult),
    MigrationCompleted(Vec<MigrationResult>),
    MigrationCancelled,
}

/// Receiver of engine events. Emission never fails the run.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: MigrationEvent);
}

impl ProgressSink for UnboundedSender<MigrationEvent> {
    fn emit(&self, event: MigrationEvent) {
        // A dropped receiver only means nobody is watching.
        let _ = self.send(event);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: MigrationEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn batches_round_up() {
        assert_eq!(MigrationProgress::start(EntityType::User, 5, 2).total_batches, 3);
        assert_eq!(MigrationProgress::start(EntityType::User, 0, 2).total_batches, 0);
    }

    #[test]
    fn events_serialize_tagged() {
        let value = serde_json::to_value(MigrationEvent::MigrationCancelled).unwrap();
        assert_eq!(value, json!({"event": "migration_cancelled"}));

        let progress = MigrationProgress::start(EntityType::Circle, 10, 4);
        let value = serde_json::to_value(MigrationEvent::ProgressUpdate(progress)).unwrap();
        assert_eq!(value["data"]["entityType"], json!("CIRCLE"));
        assert_eq!(value["data"]["phase"], json!("extracting"));
    }

    #[tokio::test]
    async fn channel_sink_survives_a_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        tx.emit(MigrationEvent::MigrationCancelled);
    }
}
