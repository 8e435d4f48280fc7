mod common;

use common::FakeTarget;
use std::sync::Arc;
use user_migrator::migrate::Verifier;
use user_migrator::migrate::verifier::{APP_PROFILE_COUNT_CHECK, SAMPLE_LIMIT, USER_COUNT_CHECK};
use user_migrator::models::SampledUser;

fn sampled(id: &str, email: &str) -> SampledUser {
    SampledUser {
        id: id.to_string(),
        email: Some(email.to_string()),
    }
}

#[tokio::test]
async fn clean_target_passes() {
    let target = Arc::new(
        FakeTarget::new()
            .with_counts(2, 2)
            .with_user("1", "a@x.com")
            .with_user("2", "b@x.com"),
    );
    let sample = vec![sampled("1", "a@x.com"), sampled("2", "b@x.com")];

    let report = Verifier::new(target, 4).verify(2, &sample).await;

    assert!(report.passed());
    assert_eq!(report.checks.len(), 2);
    assert_eq!(report.checks[0].name, USER_COUNT_CHECK);
    assert_eq!(report.checks[1].name, APP_PROFILE_COUNT_CHECK);
    assert!(report.checks.iter().all(|c| c.passed));
}

#[tokio::test]
async fn reports_missing_and_mismatched_users() {
    let target = Arc::new(
        FakeTarget::new()
            .with_counts(3, 3)
            .with_user("1", "a@x.com")
            .with_user("2", "other@x.com"),
    );
    let sample = vec![
        sampled("1", "a@x.com"),
        sampled("2", "b@x.com"),
        sampled("3", "c@x.com"),
    ];

    let report = Verifier::new(target, 2).verify(3, &sample).await;

    assert!(!report.passed());
    assert_eq!(report.missing_users.len(), 1);
    assert_eq!(report.missing_users[0].user_id, "3");
    assert_eq!(report.missing_users[0].email, "c@x.com");

    assert_eq!(report.mismatches.len(), 1);
    let mismatch = &report.mismatches[0];
    assert_eq!(mismatch.user_id, "2");
    assert_eq!(mismatch.field, "email");
    assert_eq!(mismatch.expected, "b@x.com");
    assert_eq!(mismatch.actual, "other@x.com");
}

#[tokio::test]
async fn failed_lookup_counts_as_missing() {
    let target = Arc::new(
        FakeTarget::new()
            .with_counts(1, 1)
            .with_user("1", "a@x.com")
            .with_failing_lookup("1"),
    );

    let report = Verifier::new(target, 1)
        .verify(1, &[sampled("1", "a@x.com")])
        .await;

    assert_eq!(report.missing_users.len(), 1);
    assert!(report.mismatches.is_empty());
    assert!(!report.passed());
}

#[tokio::test]
async fn failed_count_reports_zero() {
    let target = Arc::new(FakeTarget::new());

    let report = Verifier::new(target, 1).verify(5, &[]).await;

    assert_eq!(report.checks.len(), 2);
    for check in &report.checks {
        assert_eq!(check.expected, 5);
        assert_eq!(check.actual, 0);
        assert!(!check.passed);
    }
    assert!(!report.passed());
}

#[tokio::test]
async fn count_mismatch_fails_only_that_check() {
    let target = Arc::new(FakeTarget::new().with_counts(10, 9));

    let report = Verifier::new(target, 1).verify(10, &[]).await;

    assert!(report.checks[0].passed);
    assert!(!report.checks[1].passed);
    assert_eq!(report.checks[1].actual, 9);
    assert!(!report.passed());
}

#[tokio::test]
async fn sample_is_capped() {
    let target = Arc::new(FakeTarget::new().with_counts(0, 0));
    let sample: Vec<SampledUser> = (0..SAMPLE_LIMIT + 20)
        .map(|i| sampled(&i.to_string(), &format!("{i}@x.com")))
        .collect();

    let report = Verifier::new(target, 8).verify(0, &sample).await;

    assert_eq!(report.missing_users.len(), SAMPLE_LIMIT);
}

#[tokio::test]
async fn users_without_email_match_when_target_has_none() {
    let target = Arc::new(
        FakeTarget::new()
            .with_counts(2, 2)
            .with_user_without_email("p1")
            .with_user("p2", "late@x.com"),
    );
    let sample = vec![
        SampledUser {
            id: "p1".to_string(),
            email: None,
        },
        SampledUser {
            id: "p2".to_string(),
            email: None,
        },
    ];

    let report = Verifier::new(target, 2).verify(2, &sample).await;

    assert_eq!(report.mismatches.len(), 1);
    let mismatch = &report.mismatches[0];
    assert_eq!(mismatch.user_id, "p2");
    assert_eq!(mismatch.expected, "");
    assert_eq!(mismatch.actual, "late@x.com");
    assert!(!report.passed());
}

#[tokio::test]
async fn target_dropping_an_email_is_a_mismatch() {
    let target = Arc::new(
        FakeTarget::new()
            .with_counts(1, 1)
            .with_user_without_email("1"),
    );

    let report = Verifier::new(target, 1)
        .verify(1, &[sampled("1", "a@x.com")])
        .await;

    assert_eq!(report.mismatches.len(), 1);
    assert_eq!(report.mismatches[0].expected, "a@x.com");
    assert_eq!(report.mismatches[0].actual, "");
}
