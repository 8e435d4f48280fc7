//! Collapse source records that describe the same account.
//!
//! Records are consumed once, in order. The first record seen for a key
//! holds that key's slot in the output; under `KeepLatest` a newer record can
//! take over the slot but never moves it.

use crate::config::{DedupConfig, DedupKey, DedupStrategy};
use crate::error::{MigrationError, MigrationResult};
use crate::models::{ConflictRecord, SourceRecord};
use serde::Serialize;
use std::collections::HashMap;

/// Counters for one dedup pass. `unique + duplicates + skipped_no_key == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    /// Number of records read from the source
    pub total: usize,
    /// Number of distinct keys, one output record each
    pub unique: usize,
    /// Number of records whose key was already seen
    pub duplicates: usize,
    /// Number of records dropped for lack of a key
    pub skipped_no_key: usize,
}

/// Result of a successful dedup pass.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub records: Vec<SourceRecord>,
    pub conflicts: Vec<ConflictRecord>,
    pub stats: DedupStats,
}

pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Deduplicate `records` according to the configured key and strategy.
    ///
    /// Under `DedupStrategy::Error` the first duplicate aborts the pass with
    /// `MigrationError::DuplicateKey` and nothing is returned.
    pub fn deduplicate<I>(&self, records: I) -> MigrationResult<DedupOutcome>
    where
        I: IntoIterator<Item = SourceRecord>,
    {
        if self.config.strategy == DedupStrategy::None {
            let records: Vec<SourceRecord> = records.into_iter().collect();
            let stats = DedupStats {
                total: records.len(),
                unique: records.len(),
                ..DedupStats::default()
            };
            log::info!("dedup disabled: passing through {} records", stats.total);
            return Ok(DedupOutcome {
                records,
                conflicts: Vec::new(),
                stats,
            });
        }

        let mut stats = DedupStats::default();
        let mut conflicts = Vec::new();
        let mut output: Vec<SourceRecord> = Vec::new();
        // key -> index of the canonical record in `output`
        let mut slots: HashMap<String, usize> = HashMap::new();

        for record in records {
            stats.total += 1;

            let Some(key) = dedup_key(&record, self.config.key) else {
                stats.skipped_no_key += 1;
                log::trace!("record {} has no {} key, skipping", record.id, self.config.key);
                continue;
            };

            let Some(&slot) = slots.get(&key) else {
                slots.insert(key, output.len());
                output.push(record);
                stats.unique += 1;
                continue;
            };

            stats.duplicates += 1;
            let existing = &output[slot];
            log::debug!(
                "duplicate key '{}': existing {}, duplicate {}",
                key,
                existing.id,
                record.id
            );

            match self.config.strategy {
                DedupStrategy::Error => {
                    return Err(MigrationError::DuplicateKey {
                        key,
                        existing_id: existing.id.clone(),
                        duplicate_id: record.id,
                    });
                }
                DedupStrategy::KeepLatest if should_replace(&record, existing) => {
                    conflicts.push(ConflictRecord {
                        key,
                        existing: existing.clone(),
                        duplicate: record.clone(),
                    });
                    output[slot] = record;
                }
                _ => {
                    conflicts.push(ConflictRecord {
                        key,
                        existing: existing.clone(),
                        duplicate: record,
                    });
                }
            }
        }

        log::info!(
            "dedup by {} ({}): {} total, {} unique, {} duplicates, {} without key",
            self.config.key,
            self.config.strategy,
            stats.total,
            stats.unique,
            stats.duplicates,
            stats.skipped_no_key
        );

        Ok(DedupOutcome {
            records: output,
            conflicts,
            stats,
        })
    }
}

fn normalized(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Compute the normalized dedup key for `record`, or `None` when every
/// contributing field is absent or blank.
pub fn dedup_key(record: &SourceRecord, key: DedupKey) -> Option<String> {
    let email = || normalized(record.email.as_deref());
    let phone = || normalized(record.phone.as_deref());
    let username = || normalized(record.username.as_deref());

    match key {
        DedupKey::Email => email(),
        DedupKey::Phone => phone(),
        DedupKey::Username => username(),
        DedupKey::EmailOrPhone => email().or_else(phone),
        DedupKey::UsernameOrEmail => username().or_else(email),
    }
}

/// `KeepLatest` replacement rule: only a strictly newer timestamp wins, and a
/// record without a timestamp never replaces anything.
fn should_replace(candidate: &SourceRecord, existing: &SourceRecord) -> bool {
    match (candidate.created_at, existing.created_at) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(new), Some(old)) => new > old,
    }
}
