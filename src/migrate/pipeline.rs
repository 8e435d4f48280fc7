//! Run orchestration: dedup, import and verification as one migration, and
//! assembly of the report handed to the renderer.

use super::dedup::{DedupStats, Deduplicator};
use super::import::{BulkImporter, ImportStats};
use super::password::{self, HashAlgorithm};
use super::verifier::{SAMPLE_LIMIT, Verifier, draw_sample};
use crate::config::{MigrationConfig, PasswordStrategy};
use crate::error::{MigrationError, MigrationResult};
use crate::models::{ConflictRecord, ImportResult, SampledUser, SourceRecord, VerificationReport};
use crate::target::TargetApi;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which part of the migration to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStep {
    Import,
    Verify,
    All,
}

impl MigrationStep {
    fn imports(self) -> bool {
        matches!(self, MigrationStep::Import | MigrationStep::All)
    }

    fn verifies(self) -> bool {
        matches!(self, MigrationStep::Verify | MigrationStep::All)
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MigrationStep::Import => "import",
            MigrationStep::Verify => "verify",
            MigrationStep::All => "all",
        })
    }
}

impl FromStr for MigrationStep {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "import" => Ok(MigrationStep::Import),
            "verify" => Ok(MigrationStep::Verify),
            "all" | "" => Ok(MigrationStep::All),
            other => Err(MigrationError::config(format!(
                "unknown migration step '{other}'"
            ))),
        }
    }
}

/// Source-side facts the verifier needs: the row count and a random sample.
#[derive(Debug, Clone, Default)]
pub struct VerificationInput {
    pub source_count: u64,
    pub sample: Vec<SampledUser>,
}

/// A conflict as it appears in the report, without record payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictSummary {
    pub key: String,
    pub existing_id: String,
    pub duplicate_id: String,
}

impl From<&ConflictRecord> for ConflictSummary {
    fn from(conflict: &ConflictRecord) -> Self {
        Self {
            key: conflict.key.clone(),
            existing_id: conflict.existing.id.clone(),
            duplicate_id: conflict.duplicate.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub step: MigrationStep,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dedup_stats: DedupStats,
    pub conflicts: Vec<ConflictSummary>,
    pub password_algorithm: Option<HashAlgorithm>,
    pub import_stats: ImportStats,
    pub import_results: Vec<ImportResult>,
    pub verification: Option<VerificationReport>,
    pub verification_passed: Option<bool>,
}

impl MigrationReport {
    fn start(step: MigrationStep, dry_run: bool) -> Self {
        Self {
            step,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            dedup_stats: DedupStats::default(),
            conflicts: Vec::new(),
            password_algorithm: None,
            import_stats: ImportStats::default(),
            import_results: Vec::new(),
            verification: None,
            verification_passed: None,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0)
    }

    /// Pretty JSON for the external renderer.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Runs one migration against a target.
pub struct MigrationPipeline<T: TargetApi + ?Sized> {
    target: Arc<T>,
    config: MigrationConfig,
}

impl<T: TargetApi + ?Sized + 'static> MigrationPipeline<T> {
    pub fn new(target: Arc<T>, config: MigrationConfig) -> MigrationResult<Self> {
        config.validate()?;
        Ok(Self { target, config })
    }

    /// Execute `step`.
    ///
    /// `records` is read only when importing. Verification uses `verification`
    /// when given; otherwise, after an import step, it uses the number of
    /// records read and a random sample of the deduplicated records.
    ///
    /// Configuration problems and duplicate keys under the `error` strategy
    /// abort the run. Batch and lookup failures never do.
    pub async fn run<I>(
        &self,
        step: MigrationStep,
        records: I,
        verification: Option<VerificationInput>,
    ) -> MigrationResult<MigrationReport>
    where
        I: IntoIterator<Item = SourceRecord>,
    {
        let mut report = MigrationReport::start(step, self.config.dry_run);
        log::info!(
            "migration started: step={}, dry_run={}",
            step,
            self.config.dry_run
        );

        let mut deduplicated: Option<Vec<SourceRecord>> = None;

        if step.imports() {
            let outcome = Deduplicator::new(self.config.dedup).deduplicate(records)?;
            report.dedup_stats = outcome.stats;
            report.conflicts = outcome.conflicts.iter().map(ConflictSummary::from).collect();
            report.password_algorithm = self.inspect_password_hashes(&outcome.records);

            if self.config.dry_run {
                log::info!(
                    "dry run: skipping import of {} records",
                    outcome.records.len()
                );
                report.import_stats = ImportStats {
                    total: outcome.records.len() as u64,
                    ..ImportStats::default()
                };
            } else {
                let importer = BulkImporter::from_config(Arc::clone(&self.target), &self.config);
                report.import_results = importer.import_all(&outcome.records).await;
                report.import_stats = importer.stats();
            }

            deduplicated = Some(outcome.records);
        }

        if step.verifies() {
            let input = match (verification, &deduplicated) {
                (Some(input), _) => input,
                (None, Some(records)) => {
                    let sample = {
                        let mut rng = rand::thread_rng();
                        draw_sample(records, SAMPLE_LIMIT, &mut rng)
                    };
                    VerificationInput {
                        source_count: report.dedup_stats.total as u64,
                        sample,
                    }
                }
                (None, None) => {
                    return Err(MigrationError::config(
                        "verification requires a source count and sample",
                    ));
                }
            };

            let verifier = Verifier::new(Arc::clone(&self.target), self.config.workers);
            let verification = verifier.verify(input.source_count, &input.sample).await;
            report.verification_passed = Some(verification.passed());
            report.verification = Some(verification);
        }

        report.finished_at = Some(Utc::now());
        log::info!(
            "migration finished in {:.2}s",
            report.duration_seconds()
        );

        Ok(report)
    }

    fn inspect_password_hashes(&self, records: &[SourceRecord]) -> Option<HashAlgorithm> {
        let hashes: Vec<&str> = records
            .iter()
            .filter_map(|r| r.password_hash.as_deref())
            .filter(|h| !h.trim().is_empty())
            .collect();

        if hashes.is_empty() {
            return None;
        }

        let detected = password::detect_from_sample(hashes.iter().copied());
        log::info!(
            "detected password algorithm {} over {} hashes",
            detected,
            hashes.len()
        );

        if self.config.entry.password_strategy == PasswordStrategy::Transfer {
            let expected = self.config.entry.password_algorithm.trim().to_ascii_lowercase();
            if detected.to_string() != expected {
                log::warn!(
                    "password hashes look like {} but {} is configured; transferred hashes may not verify",
                    detected,
                    expected
                );
            }

            if detected == HashAlgorithm::Bcrypt {
                let malformed = hashes
                    .iter()
                    .filter(|h| !password::is_bcrypt_compatible(h))
                    .count();
                if malformed > 0 {
                    log::warn!("{} bcrypt hashes are malformed", malformed);
                }
            }
        }

        Some(detected)
    }
}
