//! The migration engine: extract, transform, validate, load, in batches.
//!
//! One engine runs one plan at a time. Entity types run in plan order and
//! batches in offset order; nothing fans out. Cancellation is cooperative
//! and observed at batch boundaries and between entity types.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use mm_core::{Entity, EntityType, WriteKind};
use mm_db::KeyValueStore;
use mm_db::store::MAX_BATCH_WRITE;
use mm_validate::{FieldRule, ValidationReport, apply_rules, validate_with, validator_for};
use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::MigrationError;
use crate::mapping::MigrationMapping;
use crate::plan::{MigrationPlan, PlanHook};
use crate::progress::{MigrationEvent, MigrationPhase, MigrationProgress, NullSink, ProgressSink};
use crate::result::{ErrorKind, MigrationResult, RecordError, rate};
use crate::source::{DataSource, Row};

/// Record id used when a record has no `PK`.
const UNKNOWN_RECORD: &str = "unknown";

/// Knobs of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub batch_size: usize,
    /// Extract, transform and validate, but never write.
    pub dry_run: bool,
    /// Run structural, entity and plan validation on every record.
    pub validate_data: bool,
    pub backup_before_migration: bool,
    /// Record a failed entity type and move on instead of aborting.
    pub continue_on_error: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_WRITE,
            dry_run: false,
            validate_data: true,
            backup_before_migration: false,
            continue_on_error: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
}

/// Requests cancellation of a running engine from anywhere.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    sink: Arc<dyn ProgressSink>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.sink.emit(MigrationEvent::MigrationCancelled);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct MigrationEngine<S: ?Sized> {
    store: Arc<S>,
    source: Option<Arc<dyn DataSource>>,
    sink: Arc<dyn ProgressSink>,
    backup: Option<Arc<dyn PlanHook>>,
    state: Mutex<EngineState>,
    progress: Mutex<BTreeMap<EntityType, MigrationProgress>>,
    cancel: CancelHandle,
}

/// Returns the engine to `Idle` however the run ends.
struct RunGuard<'a>(&'a Mutex<EngineState>);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *lock(self.0) = EngineState::Idle;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counters of one entity migration in flight.
struct Tally {
    result: MigrationResult,
    started: Instant,
}

impl<S: KeyValueStore + ?Sized> MigrationEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_sink(store, Arc::new(NullSink))
    }

    /// An engine reporting to `sink` for its whole life.
    pub fn with_sink(store: Arc<S>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            store,
            source: None,
            backup: None,
            state: Mutex::new(EngineState::Idle),
            progress: Mutex::new(BTreeMap::new()),
            cancel: CancelHandle {
                flag: Arc::new(AtomicBool::new(false)),
                sink: Arc::clone(&sink),
            },
            sink,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Hook run when `backup_before_migration` is set.
    #[must_use]
    pub fn with_backup(mut self, hook: Arc<dyn PlanHook>) -> Self {
        self.backup = Some(hook);
        self
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        *lock(&self.state)
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Request cancellation and emit `MigrationCancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn get_progress(&self, entity_type: EntityType) -> Option<MigrationProgress> {
        lock(&self.progress).get(&entity_type).cloned()
    }

    #[must_use]
    pub fn get_all_progress(&self) -> Vec<MigrationProgress> {
        lock(&self.progress).values().cloned().collect()
    }

    /// Run every mapping of `plan` in order.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if a run is in flight, `Cancelled` (with partial
    /// results) after [`MigrationEngine::cancel`], a hook failure, or the
    /// first entity failure when `continue_on_error` is false.
    pub async fn execute_migration_plan(
        &self,
        plan: &MigrationPlan,
        config: &MigrationConfig,
    ) -> Result<Vec<MigrationResult>, MigrationError> {
        if config.batch_size == 0 {
            return Err(MigrationError::InvalidConfig(
                "batch_size must be greater than zero".into(),
            ));
        }
        plan.validate()?;

        let _guard = self.start()?;
        self.cancel.reset();
        info!(
            plan = %plan.name,
            version = %plan.version,
            entities = plan.entities.len(),
            dry_run = config.dry_run,
            "migration started"
        );

        let outcome = self.run_plan(plan, config).await;

        if let Some(source) = &self.source {
            if let Err(e) = source.disconnect().await {
                warn!(error = %e, "failed to disconnect data source");
            }
        }
        outcome
    }

    fn start(&self) -> Result<RunGuard<'_>, MigrationError> {
        let mut state = lock(&self.state);
        if *state == EngineState::Running {
            return Err(MigrationError::AlreadyRunning);
        }
        *state = EngineState::Running;
        Ok(RunGuard(&self.state))
    }

    async fn run_plan(
        &self,
        plan: &MigrationPlan,
        config: &MigrationConfig,
    ) -> Result<Vec<MigrationResult>, MigrationError> {
        if let Some(source) = &self.source {
            source.connect().await?;
        }
        for hook in &plan.pre_hooks {
            run_hook(hook.as_ref()).await?;
        }
        if config.backup_before_migration {
            match &self.backup {
                Some(hook) => run_hook(hook.as_ref()).await?,
                None => warn!("backup requested but no backup hook is configured"),
            }
        }

        let mut results = Vec::with_capacity(plan.entities.len());
        for mapping in &plan.entities {
            if self.cancel.is_cancelled() {
                return Err(MigrationError::Cancelled { results });
            }

            let rules = plan.rules_for(mapping.entity_type);
            match self.migrate_entity(mapping, config, rules).await {
                Ok(result) => {
                    self.sink.emit(MigrationEvent::EntityCompleted(result.clone()));
                    results.push(result);
                    if self.cancel.is_cancelled() {
                        return Err(MigrationError::Cancelled { results });
                    }
                }
                Err(e) if config.continue_on_error => {
                    error!(
                        entity_type = %mapping.entity_type,
                        error = %e,
                        "entity migration failed; continuing"
                    );
                    results.push(MigrationResult::aborted(mapping.entity_type, e.to_string()));
                }
                Err(e) => {
                    error!(
                        entity_type = %mapping.entity_type,
                        error = %e,
                        "entity migration failed; aborting"
                    );
                    return Err(e);
                }
            }
        }

        for hook in &plan.post_hooks {
            run_hook(hook.as_ref()).await?;
        }

        info!(plan = %plan.name, entities = results.len(), "migration completed");
        self.sink.emit(MigrationEvent::MigrationCompleted(results.clone()));
        Ok(results)
    }

    /// Migrate one entity type. A cancelled run yields the partial result.
    ///
    /// # Errors
    ///
    /// Extraction failures and a missing data source.
    pub async fn migrate_entity(
        &self,
        mapping: &MigrationMapping,
        config: &MigrationConfig,
        rules: &[FieldRule],
    ) -> Result<MigrationResult, MigrationError> {
        let span = info_span!(
            "migrate_entity",
            entity_type = %mapping.entity_type,
            source = %mapping.source
        );
        async {
            let mut progress = MigrationProgress::start(mapping.entity_type, 0, config.batch_size);
            let outcome = self.run_batches(mapping, config, rules, &mut progress).await;
            match &outcome {
                Ok(result) => {
                    progress.phase = if self.cancel.is_cancelled() {
                        MigrationPhase::Failed
                    } else {
                        MigrationPhase::Completed
                    };
                    info!(
                        processed = result.processed_records,
                        successful = result.successful_records,
                        failed = result.failed_records,
                        skipped = result.skipped_records,
                        "entity migration finished"
                    );
                }
                Err(_) => progress.phase = MigrationPhase::Failed,
            }
            self.publish(&progress);
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_batches(
        &self,
        mapping: &MigrationMapping,
        config: &MigrationConfig,
        rules: &[FieldRule],
        progress: &mut MigrationProgress,
    ) -> Result<MigrationResult, MigrationError> {
        let source = self.source.as_ref().ok_or(MigrationError::NoSource)?;
        let counted = mapping.source.table();
        let total_records = match counted {
            Some(table) => source.get_row_count(table).await?,
            None => 0,
        };
        *progress = MigrationProgress::start(mapping.entity_type, total_records, config.batch_size);
        self.publish(progress);

        let mut tally = Tally {
            result: MigrationResult {
                total_records,
                ..MigrationResult::empty(mapping.entity_type)
            },
            started: Instant::now(),
        };
        let mut offset = 0;

        loop {
            if self.cancel.is_cancelled() {
                warn!(offset, "cancellation observed at batch boundary");
                break;
            }

            progress.current_batch += 1;
            progress.phase = MigrationPhase::Extracting;
            self.publish(progress);
            let rows = source.query(&mapping.source.page(config.batch_size, offset)).await?;
            if rows.is_empty() {
                break;
            }
            debug!(batch = progress.current_batch, offset, rows = rows.len(), "extracted batch");
            if counted.is_none() {
                tally.result.total_records += rows.len() as u64;
                progress.total_records = tally.result.total_records;
            }

            progress.phase = MigrationPhase::Transforming;
            self.publish(progress);
            let mapped = transform_batch(mapping, &rows, &mut tally);

            progress.phase = MigrationPhase::Validating;
            self.publish(progress);
            let valid = validate_batch(
                mapping.entity_type,
                mapped,
                rules,
                config.validate_data,
                &mut tally,
            );

            if !valid.is_empty() {
                progress.phase = MigrationPhase::Loading;
                self.publish(progress);
                self.load_batch(valid, config.dry_run, &mut tally).await;
            }

            let result = &tally.result;
            progress.processed_records = result.processed_records;
            progress.errors = result.errors.len();
            progress.throughput = rate(result.processed_records, tally.started.elapsed());
            progress.estimated_completion = estimate_completion(progress);
            self.publish(progress);

            offset += config.batch_size;
            if rows.len() < config.batch_size {
                break;
            }
        }

        let Tally { mut result, started } = tally;
        // The source may have grown since it was counted.
        result.total_records = result
            .total_records
            .max(result.processed_records + result.skipped_records);
        result.finish(started.elapsed());
        Ok(result)
    }

    /// Write `items` in store-sized chunks; a failed chunk fails each of
    /// its items.
    async fn load_batch(&self, items: Vec<Entity>, dry_run: bool, tally: &mut Tally) {
        let result = &mut tally.result;
        if dry_run {
            result.successful_records += items.len() as u64;
            result.processed_records += items.len() as u64;
            return;
        }

        for chunk in items.chunks(MAX_BATCH_WRITE) {
            let count = chunk.len() as u64;
            match self.store.batch_write(chunk.to_vec(), WriteKind::Put).await {
                Ok(()) => result.successful_records += count,
                Err(e) => {
                    warn!(items = chunk.len(), error = %e, "write batch failed");
                    let message = e.to_string();
                    for item in chunk {
                        result.errors.push(
                            RecordError::new(ErrorKind::Write, message.clone())
                                .record(record_id(item), Value::from(item.clone())),
                        );
                    }
                    result.failed_records += count;
                }
            }
            result.processed_records += count;
        }
    }

    fn publish(&self, progress: &MigrationProgress) {
        lock(&self.progress).insert(progress.entity_type, progress.clone());
        self.sink.emit(MigrationEvent::ProgressUpdate(progress.clone()));
    }
}

async fn run_hook(hook: &dyn PlanHook) -> Result<(), MigrationError> {
    debug!(hook = hook.name(), "running hook");
    hook.run().await.map_err(|e| MigrationError::Hook {
        name: hook.name().to_string(),
        message: format!("{e:#}"),
    })
}

fn record_id(entity: &Entity) -> String {
    entity.pk().unwrap_or(UNKNOWN_RECORD).to_string()
}

/// Map rows to entities; filtered rows are skipped, failing ones recorded.
fn transform_batch(mapping: &MigrationMapping, rows: &[Row], tally: &mut Tally) -> Vec<Entity> {
    let result = &mut tally.result;
    let mut mapped = Vec::with_capacity(rows.len());
    for row in rows {
        match mapping.map_row(row) {
            Ok(Some(entity)) => mapped.push(entity),
            Ok(None) => result.skipped_records += 1,
            Err(message) => {
                let id = row.get("id").map_or_else(|| UNKNOWN_RECORD.to_string(), value_id);
                warn!(record = %id, error = %message, "record failed to transform");
                let error = RecordError::new(ErrorKind::Transformation, message)
                    .record(id, Value::Object(row.clone()));
                result.errors.push(error);
                result.failed_records += 1;
                result.processed_records += 1;
            }
        }
    }
    mapped
}

fn value_id(value: &Value) -> String {
    value.as_str().map_or_else(|| value.to_string(), str::to_owned)
}

/// Split mapped entities into valid ones and recorded failures.
fn validate_batch(
    entity_type: EntityType,
    mapped: Vec<Entity>,
    rules: &[FieldRule],
    validate_data: bool,
    tally: &mut Tally,
) -> Vec<Entity> {
    if !validate_data {
        return mapped;
    }
    let result = &mut tally.result;
    let mut valid = Vec::with_capacity(mapped.len());
    for entity in mapped {
        let report = full_report(entity_type, &entity, rules);
        if report.is_valid() {
            valid.push(entity);
            continue;
        }
        let id = record_id(&entity);
        let message = report.messages().join(", ");
        warn!(record = %id, error = %message, "record failed validation");
        result.errors.push(
            RecordError::new(ErrorKind::Validation, message)
                .record(id, Value::from(entity))
                .issues(report.errors),
        );
        result.failed_records += 1;
        result.processed_records += 1;
    }
    valid
}

/// Structural stages and entity rules, then the plan's field rules.
fn full_report(entity_type: EntityType, entity: &Entity, rules: &[FieldRule]) -> ValidationReport {
    let mut report = validate_with(entity, Some(validator_for(entity_type)));
    if report.is_valid() {
        report.merge(apply_rules(entity, rules));
    }
    report
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn estimate_completion(progress: &MigrationProgress) -> Option<chrono::DateTime<Utc>> {
    if progress.total_records == 0 || progress.throughput <= 0.0 {
        return None;
    }
    let remaining = progress.total_records.saturating_sub(progress.processed_records) as f64;
    let millis = (remaining / progress.throughput * 1000.0) as i64;
    Some(Utc::now() + chrono::Duration::milliseconds(millis))
}
