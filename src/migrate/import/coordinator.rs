//! Import coordination for batched delivery to the identity service.
//!
//! The BulkImporter drives the whole import step:
//! 1. Split the deduplicated records into contiguous batches
//! 2. Submit batches concurrently, at most `workers` requests in flight
//! 3. Reconcile each response with the submitted records, in order
//! 4. Fold every finished batch into the run's ImportStats

use super::entry_builder::build_import_entry;
use super::stats::ImportStats;
use crate::config::{ConflictStrategy, EntryConfig, MigrationConfig};
use crate::models::{ImportResult, ImportStatus, SourceRecord};
use crate::target::{BulkImportRequest, ImportDetail, TargetApi, TargetError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A batch the target accepted, reconciled record by record.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub index: usize,
    pub results: Vec<ImportResult>,
    pub stats: ImportStats,
}

/// A batch that produced no usable response. Never fatal to the run.
#[derive(Debug, Clone, Error)]
#[error("batch {index} ({} records) failed: {note}", .source_ids.len())]
pub struct BatchError {
    pub index: usize,
    pub source_ids: Vec<String>,
    pub note: String,
}

impl BatchError {
    fn new(index: usize, batch: &[SourceRecord], note: String) -> Self {
        Self {
            index,
            source_ids: batch.iter().map(|r| r.id.clone()).collect(),
            note,
        }
    }

    /// Every record in the batch, marked as an error with the shared note.
    pub fn into_results(self) -> Vec<ImportResult> {
        let note = self.note;
        self.source_ids
            .into_iter()
            .map(|id| ImportResult::error(id, note.clone()))
            .collect()
    }
}

/// Coordinates concurrent bulk-import requests for one migration run.
pub struct BulkImporter<T: TargetApi + ?Sized> {
    target: Arc<T>,
    batch_size: usize,
    workers: usize,
    on_conflict: ConflictStrategy,
    entry_config: Arc<EntryConfig>,
    stats: Arc<Mutex<ImportStats>>,
}

impl<T: TargetApi + ?Sized + 'static> BulkImporter<T> {
    pub fn new(
        target: Arc<T>,
        batch_size: usize,
        workers: usize,
        on_conflict: ConflictStrategy,
        entry_config: EntryConfig,
    ) -> Self {
        Self {
            target,
            batch_size: batch_size.max(1),
            workers: workers.max(1),
            on_conflict,
            entry_config: Arc::new(entry_config),
            stats: Arc::new(Mutex::new(ImportStats::default())),
        }
    }

    pub fn from_config(target: Arc<T>, config: &MigrationConfig) -> Self {
        Self::new(
            target,
            config.batch_size,
            config.workers,
            config.on_conflict,
            config.entry.clone(),
        )
    }

    /// Snapshot of the counters accumulated so far.
    pub fn stats(&self) -> ImportStats {
        *self.stats.lock()
    }

    /// Import every record, returning one result per record.
    ///
    /// Results come back in input order even though batches finish in any
    /// order. A failed batch marks its own records as errors and never stops
    /// the others.
    pub async fn import_all(&self, records: &[SourceRecord]) -> Vec<ImportResult> {
        if records.is_empty() {
            return Vec::new();
        }

        let batches: Vec<Vec<SourceRecord>> = records
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let batch_count = batches.len();

        log::info!(
            "importing {} records in {} batches (batch size {}, {} workers, on_conflict={})",
            records.len(),
            batch_count,
            self.batch_size,
            self.workers,
            self.on_conflict
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        let mut task_batches = HashMap::with_capacity(batch_count);

        for (index, batch) in batches.into_iter().enumerate() {
            let target = Arc::clone(&self.target);
            let semaphore = Arc::clone(&semaphore);
            let entry_config = Arc::clone(&self.entry_config);
            let on_conflict = self.on_conflict;
            let ids: Vec<String> = batch.iter().map(|r| r.id.clone()).collect();

            let handle = tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(err) => {
                        return Err(BatchError::new(
                            index,
                            &batch,
                            format!("concurrency gate closed: {err}"),
                        ));
                    }
                };
                import_batch(target.as_ref(), index, &batch, on_conflict, &entry_config).await
            });
            task_batches.insert(handle.id(), (index, ids));
        }

        let mut per_batch: Vec<Option<Vec<ImportResult>>> = vec![None; batch_count];

        while let Some(joined) = tasks.join_next_with_id().await {
            let (index, results, contribution) = match joined {
                Ok((_, Ok(outcome))) => {
                    log::debug!(
                        "batch {}: {} records reconciled",
                        outcome.index,
                        outcome.results.len()
                    );
                    (outcome.index, outcome.results, outcome.stats)
                }
                Ok((_, Err(err))) => {
                    log::warn!("{}", err);
                    let contribution = ImportStats::failed_batch(err.source_ids.len());
                    (err.index, err.into_results(), contribution)
                }
                Err(join_err) => {
                    let Some((index, ids)) = task_batches.remove(&join_err.id()) else {
                        log::error!("import task {} finished without a batch", join_err.id());
                        continue;
                    };
                    let err = BatchError {
                        index,
                        source_ids: ids,
                        note: format!("import task failed: {join_err}"),
                    };
                    log::warn!("{}", err);
                    let contribution = ImportStats::failed_batch(err.source_ids.len());
                    (index, err.into_results(), contribution)
                }
            };

            // one lock per batch keeps each batch's counter update atomic
            self.stats.lock().merge(contribution);
            per_batch[index] = Some(results);
        }

        let results: Vec<ImportResult> = per_batch.into_iter().flatten().flatten().collect();
        let stats = self.stats();
        log::info!(
            "import finished: {} total, {} created, {} skipped, {} updated, {} errors",
            stats.total,
            stats.created,
            stats.skipped,
            stats.updated,
            stats.errors
        );

        results
    }
}

/// Submit one batch and reconcile the response.
pub async fn import_batch<T: TargetApi + ?Sized>(
    target: &T,
    index: usize,
    batch: &[SourceRecord],
    on_conflict: ConflictStrategy,
    entry_config: &EntryConfig,
) -> Result<BatchOutcome, BatchError> {
    let request = BulkImportRequest {
        users: batch
            .iter()
            .map(|record| build_import_entry(record, entry_config))
            .collect(),
        on_conflict,
    };

    log::debug!("batch {}: submitting {} records", index, batch.len());

    let response = target
        .bulk_import(&request)
        .await
        .map_err(|err| BatchError::new(index, batch, failure_note(&err)))?;

    if response.details.len() < batch.len() {
        log::debug!(
            "batch {}: target returned {} details for {} records",
            index,
            response.details.len(),
            batch.len()
        );
    }

    Ok(BatchOutcome {
        index,
        results: reconcile(batch, &response.details),
        stats: ImportStats::from_response(batch.len(), &response),
    })
}

fn failure_note(err: &TargetError) -> String {
    match err {
        TargetError::Status { status, body } => format!("HTTP {}: {}", status.as_u16(), body),
        other => format!("request failed: {other}"),
    }
}

/// Pair the i-th record with the i-th detail. Records without a detail are
/// reported as created with an empty note.
pub fn reconcile(batch: &[SourceRecord], details: &[ImportDetail]) -> Vec<ImportResult> {
    batch
        .iter()
        .enumerate()
        .map(|(i, record)| match details.get(i) {
            Some(detail) => {
                let status = ImportStatus::from_target(&detail.status);
                if status.to_string() != detail.status {
                    log::debug!(
                        "record {}: unrecognised target status '{}' counted as {}",
                        record.id,
                        detail.status,
                        status
                    );
                }
                ImportResult {
                    source_id: record.id.clone(),
                    target_id: detail.user_id.clone(),
                    status,
                    note: detail.reason.clone().unwrap_or_default(),
                }
            }
            None => ImportResult {
                source_id: record.id.clone(),
                target_id: None,
                status: ImportStatus::Created,
                note: String::new(),
            },
        })
        .collect()
}
