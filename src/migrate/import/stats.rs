//! Import statistics tracking.

use crate::models::{ImportResult, ImportStatus};
use crate::target::BulkImportResponse;
use serde::Serialize;

/// Counters for one import run. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Number of records submitted, including those of failed batches
    pub total: u64,
    /// Number of users the target created
    pub created: u64,
    /// Number of records already present in the target
    pub existing: u64,
    /// Number of records the target skipped on conflict
    pub skipped: u64,
    /// Number of existing users the target updated
    pub updated: u64,
    /// Number of records that failed, per record or with their batch
    pub errors: u64,
}

impl ImportStats {
    /// Contribution of a batch the target accepted: the response's aggregate
    /// counts, with `total` set to the submitted batch size.
    pub fn from_response(batch_len: usize, response: &BulkImportResponse) -> Self {
        Self {
            total: batch_len as u64,
            created: response.imported,
            existing: 0,
            skipped: response.skipped,
            updated: response.updated,
            errors: response.errors,
        }
    }

    /// Contribution of a batch whose request failed: every record is an error.
    pub fn failed_batch(batch_len: usize) -> Self {
        Self {
            total: batch_len as u64,
            errors: batch_len as u64,
            ..Self::default()
        }
    }

    /// Recount from per-record outcomes.
    pub fn from_results(results: &[ImportResult]) -> Self {
        let mut stats = Self::default();
        for result in results {
            stats.total += 1;
            match result.status {
                ImportStatus::Created => stats.created += 1,
                ImportStatus::Existing => stats.existing += 1,
                ImportStatus::Skipped => stats.skipped += 1,
                ImportStatus::Updated => stats.updated += 1,
                ImportStatus::Error => stats.errors += 1,
            }
        }
        stats
    }

    /// Merge another ImportStats into this one by summing all counts.
    pub fn merge(&mut self, other: ImportStats) {
        self.total += other.total;
        self.created += other.created;
        self.existing += other.existing;
        self.skipped += other.skipped;
        self.updated += other.updated;
        self.errors += other.errors;
    }
}
