//! Post-import verification against the identity service.

use crate::models::{SampledUser, SourceRecord, VerificationReport};
use crate::target::{TargetApi, TargetError, TargetUser};
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Upper bound on spot-checked users per run.
pub const SAMPLE_LIMIT: usize = 100;

pub const USER_COUNT_CHECK: &str = "User count";
pub const APP_PROFILE_COUNT_CHECK: &str = "App profiles count";

/// Compares source counts and a sample of source users with the target.
pub struct Verifier<T: TargetApi + ?Sized> {
    target: Arc<T>,
    workers: usize,
}

impl<T: TargetApi + ?Sized + 'static> Verifier<T> {
    pub fn new(target: Arc<T>, workers: usize) -> Self {
        Self {
            target,
            workers: workers.max(1),
        }
    }

    /// Build the verification report.
    ///
    /// Only the first [`SAMPLE_LIMIT`] sampled users are checked. A failed
    /// lookup counts as missing; a failed count call reports an actual of 0.
    pub async fn verify(&self, source_count: u64, sample: &[SampledUser]) -> VerificationReport {
        let mut report = VerificationReport::default();

        let target_count = count_or_zero("users", self.target.count_users().await);
        report.add_check(USER_COUNT_CHECK, source_count, target_count);

        let profile_count =
            count_or_zero("app profiles", self.target.count_app_profiles().await);
        report.add_check(APP_PROFILE_COUNT_CHECK, source_count, profile_count);

        let sample = &sample[..sample.len().min(SAMPLE_LIMIT)];
        let lookups = self.lookup_all(sample).await;

        for (user, found) in sample.iter().zip(lookups) {
            let expected = user.email.as_deref().unwrap_or_default();
            match found {
                None => {
                    log::debug!("verify: user {} missing from target", user.id);
                    report.add_missing(user.id.clone(), expected);
                }
                Some(target_user) if target_user.email != user.email => {
                    let actual = target_user.email.unwrap_or_default();
                    log::debug!(
                        "verify: user {} email mismatch (expected {}, actual {})",
                        user.id,
                        expected,
                        actual
                    );
                    report.add_mismatch(user.id.clone(), "email", expected, actual);
                }
                Some(_) => {}
            }
        }

        if report.passed() {
            log::info!(
                "verification passed: {} checks, {} users sampled",
                report.checks.len(),
                sample.len()
            );
        } else {
            log::warn!(
                "verification failed: {} failed checks, {} missing, {} mismatches",
                report.checks.iter().filter(|c| !c.passed).count(),
                report.missing_users.len(),
                report.mismatches.len()
            );
        }

        report
    }

    /// Look up every sampled user, at most `workers` requests at a time.
    /// Output is aligned with `sample`.
    async fn lookup_all(&self, sample: &[SampledUser]) -> Vec<Option<TargetUser>> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for (index, user) in sample.iter().enumerate() {
            let target = Arc::clone(&self.target);
            let semaphore = Arc::clone(&semaphore);
            let id = user.id.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, None);
                };
                match target.find_user(&id).await {
                    Ok(found) => (index, found),
                    Err(err) => {
                        log::debug!("verify: lookup of {} failed: {}", id, err);
                        (index, None)
                    }
                }
            });
        }

        let mut found: Vec<Option<TargetUser>> = vec![None; sample.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, user)) => found[index] = user,
                Err(err) => log::warn!("verify: lookup task failed: {}", err),
            }
        }

        found
    }
}

fn count_or_zero(what: &str, result: Result<u64, TargetError>) -> u64 {
    match result {
        Ok(count) => count,
        Err(err) => {
            log::warn!("verify: failed to count target {}: {}", what, err);
            0
        }
    }
}

/// Draw up to `size` distinct records uniformly at random, for callers whose
/// source is already in memory.
pub fn draw_sample<R: Rng + ?Sized>(
    records: &[SourceRecord],
    size: usize,
    rng: &mut R,
) -> Vec<SampledUser> {
    records
        .choose_multiple(rng, size.min(SAMPLE_LIMIT))
        .map(|record| SampledUser {
            id: record.id.clone(),
            email: record.email.clone(),
        })
        .collect()
}
