mod common;

use common::{FakeTarget, at, record, records};
use std::sync::Arc;
use user_migrator::config::{DedupKey, DedupStrategy, MigrationConfig};
use user_migrator::migrate::{
    HashAlgorithm, MigrationPipeline, MigrationStep, VerificationInput,
};
use user_migrator::models::{ImportStatus, SampledUser, SourceRecord};
use user_migrator::MigrationError;

const BCRYPT: &str = "$2b$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW";

fn live_config() -> MigrationConfig {
    MigrationConfig {
        dry_run: false,
        batch_size: 2,
        workers: 2,
        ..MigrationConfig::default()
    }
}

fn source() -> Vec<SourceRecord> {
    let mut input = vec![
        record("1", "z@x.com"),
        record("2", "a@x.com"),
        record("3", "b@x.com"),
        record("4", "a@x.com"),
        record("5", "c@x.com"),
    ];
    for (day, r) in (1..).zip(input.iter_mut()) {
        r.created_at = Some(at(day));
        r.password_hash = Some(BCRYPT.to_string());
    }
    input
}

#[tokio::test]
async fn import_step_dedups_and_imports() {
    let target = Arc::new(FakeTarget::new());
    let pipeline = MigrationPipeline::new(Arc::clone(&target), live_config()).unwrap();

    let report = pipeline
        .run(MigrationStep::Import, source(), None)
        .await
        .unwrap();

    assert_eq!(report.dedup_stats.total, 5);
    assert_eq!(report.dedup_stats.unique, 4);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].existing_id, "2");
    assert_eq!(report.conflicts[0].duplicate_id, "4");
    assert_eq!(report.password_algorithm, Some(HashAlgorithm::Bcrypt));

    assert_eq!(report.import_stats.total, 4);
    assert_eq!(report.import_stats.created, 4);
    let ids: Vec<&str> = report
        .import_results
        .iter()
        .map(|r| r.source_id.as_str())
        .collect();
    assert_eq!(ids, vec!["1", "4", "3", "5"]);
    assert!(report.verification.is_none());
    assert!(report.finished_at.is_some());
    assert!(report.duration_seconds() >= 0.0);
    assert_eq!(target.request_count(), 2);
}

#[tokio::test]
async fn dry_run_never_contacts_target() {
    let target = Arc::new(FakeTarget::new());
    let config = MigrationConfig {
        dry_run: true,
        ..live_config()
    };
    let pipeline = MigrationPipeline::new(Arc::clone(&target), config).unwrap();

    let report = pipeline
        .run(MigrationStep::Import, source(), None)
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(target.request_count(), 0);
    assert_eq!(report.import_stats.total, 4);
    assert_eq!(report.import_stats.created, 0);
    assert!(report.import_results.is_empty());
}

#[tokio::test]
async fn duplicate_key_aborts_under_error_strategy() {
    let target = Arc::new(FakeTarget::new());
    let mut config = live_config();
    config.dedup.strategy = DedupStrategy::Error;
    let pipeline = MigrationPipeline::new(Arc::clone(&target), config).unwrap();

    let result = pipeline.run(MigrationStep::All, source(), None).await;

    assert!(matches!(result, Err(MigrationError::DuplicateKey { .. })));
    assert_eq!(target.request_count(), 0);
}

#[tokio::test]
async fn verify_step_uses_supplied_input() {
    let target = Arc::new(
        FakeTarget::new()
            .with_counts(1, 1)
            .with_user("1", "a@x.com"),
    );
    let pipeline = MigrationPipeline::new(target, live_config()).unwrap();
    let input = VerificationInput {
        source_count: 1,
        sample: vec![SampledUser {
            id: "1".to_string(),
            email: Some("a@x.com".to_string()),
        }],
    };

    let report = pipeline
        .run(MigrationStep::Verify, Vec::<SourceRecord>::new(), Some(input))
        .await
        .unwrap();

    assert_eq!(report.verification_passed, Some(true));
    assert_eq!(report.dedup_stats.total, 0);
    assert!(report.import_results.is_empty());
}

#[tokio::test]
async fn verify_step_without_input_is_rejected() {
    let pipeline = MigrationPipeline::new(Arc::new(FakeTarget::new()), live_config()).unwrap();

    let result = pipeline.run(MigrationStep::Verify, Vec::<SourceRecord>::new(), None).await;

    assert!(matches!(result, Err(MigrationError::Config(_))));
}

#[tokio::test]
async fn full_run_samples_imported_records() {
    // imported users are not visible through the fake's lookup, so every
    // sampled user comes back missing
    let target = Arc::new(FakeTarget::new().with_counts(3, 3));
    let pipeline = MigrationPipeline::new(Arc::clone(&target), live_config()).unwrap();

    let report = pipeline
        .run(MigrationStep::All, records(3), None)
        .await
        .unwrap();

    assert_eq!(report.import_stats.created, 3);
    let verification = report.verification.as_ref().unwrap();
    assert!(verification.checks.iter().all(|c| c.passed));
    assert_eq!(verification.missing_users.len(), 3);
    assert_eq!(report.verification_passed, Some(false));
    assert!(
        report
            .import_results
            .iter()
            .all(|r| r.status == ImportStatus::Created)
    );
}

#[tokio::test]
async fn phone_only_users_verify_cleanly() {
    let target = Arc::new(
        FakeTarget::new()
            .with_counts(1, 1)
            .with_user_without_email("p1"),
    );
    let mut config = live_config();
    config.dedup.key = DedupKey::Phone;
    let pipeline = MigrationPipeline::new(target, config).unwrap();

    let mut phone_only = SourceRecord::new("p1");
    phone_only.phone = Some("+15550100".to_string());

    let report = pipeline
        .run(MigrationStep::All, vec![phone_only], None)
        .await
        .unwrap();

    let verification = report.verification.as_ref().unwrap();
    assert!(verification.mismatches.is_empty());
    assert!(verification.missing_users.is_empty());
    assert_eq!(report.verification_passed, Some(true));
}

#[tokio::test]
async fn report_serializes_for_rendering() {
    let pipeline = MigrationPipeline::new(Arc::new(FakeTarget::new()), live_config()).unwrap();
    let report = pipeline
        .run(MigrationStep::Import, source(), None)
        .await
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    assert_eq!(json["step"], "import");
    assert_eq!(json["password_algorithm"], "bcrypt");
    assert_eq!(json["dedup_stats"]["duplicates"], 1);
    assert_eq!(json["import_results"][0]["status"], "created");
    assert!(json["conflicts"][0].get("duplicate").is_none());
}

#[test]
fn steps_parse_from_text() {
    assert_eq!("import".parse::<MigrationStep>().unwrap(), MigrationStep::Import);
    assert_eq!(" Verify ".parse::<MigrationStep>().unwrap(), MigrationStep::Verify);
    assert_eq!("all".parse::<MigrationStep>().unwrap(), MigrationStep::All);
    assert!("analyze".parse::<MigrationStep>().is_err());
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = MigrationConfig {
        workers: 0,
        ..MigrationConfig::default()
    };
    assert!(MigrationPipeline::new(Arc::new(FakeTarget::new()), config).is_err());
}
