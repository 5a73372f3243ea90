use std::collections::BTreeMap;
use std::sync::OnceLock;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use mm_core::EntityType;
use mm_migrate::{MigrationEvent, MigrationPhase, MigrationProgress};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::ui;

pub struct Progress {
    bar: Option<ProgressBar>,
}

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(MultiProgress::new)
}

impl Progress {
    #[must_use]
    pub fn spinner(message: &str) -> Self {
        if !ui::prefs().progress {
            return Self { bar: None };
        }

        let bar = multi_progress().add(ProgressBar::new_spinner());
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:>10} {pos} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        Self { bar: Some(bar) }
    }

    #[must_use]
    pub fn bar(total: u64, message: &str) -> Self {
        if !ui::prefs().progress {
            return Self { bar: None };
        }

        let bar = multi_progress().add(ProgressBar::new(total));
        bar.set_style(
            ProgressStyle::with_template("{prefix:>10} {wide_bar:.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(message.to_string());
        Self { bar: Some(bar) }
    }

    pub fn set_prefix(&self, prefix: &str) {
        if let Some(bar) = &self.bar {
            bar.set_prefix(prefix.to_string());
        }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn set_position(&self, position: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(position);
        }
    }

    pub fn finish_ok(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.to_string());
        }
    }

    pub fn finish_err(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.abandon_with_message(message.to_string());
        }
    }
}

/// One bar per entity type, driven by engine events until the channel closes.
pub async fn watch_migration(mut events: UnboundedReceiver<MigrationEvent>) {
    let mut bars: BTreeMap<EntityType, Progress> = BTreeMap::new();

    while let Some(event) = events.recv().await {
        match event {
            MigrationEvent::ProgressUpdate(progress) => {
                let bar = bars.entry(progress.entity_type).or_insert_with(|| new_bar(&progress));
                bar.set_position(progress.processed_records);
                match progress.phase {
                    MigrationPhase::Completed => bar.finish_ok("done"),
                    MigrationPhase::Failed => bar.finish_err("failed"),
                    phase => {
                        let batch = progress.current_batch;
                        bar.set_message(&format!("batch {batch} {}", phase.as_str()));
                    }
                }
            }
            MigrationEvent::EntityCompleted(result) => {
                if let Some(bar) = bars.get(&result.entity_type) {
                    bar.finish_ok(&format!(
                        "{} ok, {} failed, {} skipped",
                        result.successful_records, result.failed_records, result.skipped_records
                    ));
                }
            }
            MigrationEvent::MigrationCancelled => {
                for bar in bars.values() {
                    bar.finish_err("cancelled");
                }
            }
            MigrationEvent::MigrationCompleted(_) => {}
        }
    }
}

fn new_bar(progress: &MigrationProgress) -> Progress {
    let bar = if progress.total_records > 0 {
        Progress::bar(progress.total_records, "starting")
    } else {
        Progress::spinner("starting")
    };
    bar.set_prefix(progress.entity_type.as_str());
    bar
}
