use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use mm_config::MadmallConfig;
use mm_db::MemoryStore;
use mm_migrate::{
    MigrationConfig, MigrationEngine, MigrationError, MigrationResult, PlanHook, SqliteDataSource,
    madmall_plan,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::{MigrateArgs, OutputFormat};
use crate::output::output;
use crate::progress::watch_migration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateReport {
    pub plan: String,
    pub dry_run: bool,
    pub cancelled: bool,
    pub snapshot: String,
    /// Items in the snapshot after the run.
    pub table_items: usize,
    pub results: Vec<MigrationResult>,
}

/// Copies the snapshot file to `<snapshot>.bak`.
pub struct SnapshotBackup {
    snapshot: PathBuf,
}

impl SnapshotBackup {
    #[must_use]
    pub const fn new(snapshot: PathBuf) -> Self {
        Self { snapshot }
    }

    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.snapshot.clone().into_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }
}

#[async_trait]
impl PlanHook for SnapshotBackup {
    fn name(&self) -> &str {
        "snapshot-backup"
    }

    async fn run(&self) -> anyhow::Result<()> {
        if !self.snapshot.exists() {
            info!(snapshot = %self.snapshot.display(), "no snapshot to back up");
            return Ok(());
        }
        let target = self.backup_path();
        tokio::fs::copy(&self.snapshot, &target)
            .await
            .with_context(|| format!("failed to copy snapshot to {}", target.display()))?;
        info!(backup = %target.display(), "snapshot backed up");
        Ok(())
    }
}

/// Engine settings: configuration, then command-line overrides.
#[must_use]
pub fn run_config(args: &MigrateArgs, config: &MadmallConfig) -> MigrationConfig {
    let settings = &config.migration;
    MigrationConfig {
        batch_size: args.batch_size.unwrap_or(settings.batch_size),
        dry_run: args.dry_run || settings.dry_run,
        validate_data: settings.validate_data,
        backup_before_migration: args.backup || settings.backup_before_migration,
        continue_on_error: if args.fail_fast {
            false
        } else {
            args.continue_on_error || settings.continue_on_error
        },
    }
}

pub async fn handle(
    args: &MigrateArgs,
    config: &MadmallConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let source_path = config.source_path(args.source.as_deref())?;
    anyhow::ensure!(
        source_path.exists(),
        "source database {} does not exist",
        source_path.display()
    );
    let snapshot = args
        .snapshot
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.store.snapshot_path));

    let report = migrate(&source_path, &snapshot, args, config).await?;
    output(&report, format)?;
    anyhow::ensure!(!report.cancelled, "migration cancelled");
    Ok(())
}

pub async fn migrate(
    source_path: &Path,
    snapshot: &Path,
    args: &MigrateArgs,
    config: &MadmallConfig,
) -> anyhow::Result<MigrateReport> {
    let run = run_config(args, config);
    let mut plan = madmall_plan();
    if !args.only.is_empty() {
        plan = plan.restricted_to(&args.only);
    }

    let store = Arc::new(
        MemoryStore::load_snapshot(snapshot)
            .with_context(|| format!("failed to load snapshot {}", snapshot.display()))?,
    );
    let (tx, rx) = mpsc::unbounded_channel();
    let engine = MigrationEngine::with_sink(Arc::clone(&store), Arc::new(tx))
        .with_source(Arc::new(SqliteDataSource::new(source_path)))
        .with_backup(Arc::new(SnapshotBackup::new(snapshot.to_path_buf())));

    let watcher = tokio::spawn(watch_migration(rx));
    let cancel = engine.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling after the current batch");
            cancel.cancel();
        }
    });

    let outcome = engine.execute_migration_plan(&plan, &run).await;

    interrupt.abort();
    let _ = interrupt.await;
    drop(engine);
    let _ = watcher.await;

    let (results, cancelled) = match outcome {
        Ok(results) => (results, false),
        Err(MigrationError::Cancelled { results }) => (results, true),
        Err(e) => return Err(e.into()),
    };

    if !run.dry_run {
        store
            .save_snapshot(snapshot)
            .await
            .with_context(|| format!("failed to save snapshot {}", snapshot.display()))?;
    }

    Ok(MigrateReport {
        plan: plan.name,
        dry_run: run.dry_run,
        cancelled,
        snapshot: snapshot.display().to_string(),
        table_items: store.len().await,
        results,
    })
}
