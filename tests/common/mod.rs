#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use user_migrator::models::SourceRecord;
use user_migrator::target::{
    BulkImportRequest, BulkImportResponse, ImportDetail, TargetApi, TargetError, TargetUser,
};

pub fn record(id: &str, email: &str) -> SourceRecord {
    SourceRecord {
        email: Some(email.to_string()),
        ..SourceRecord::new(id)
    }
}

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
}

pub fn records(count: usize) -> Vec<SourceRecord> {
    (0..count)
        .map(|i| record(&format!("u{i}"), &format!("user{i}@example.com")))
        .collect()
}

/// In-process identity service. Every accepted record is reported as
/// `created` unless configured otherwise.
#[derive(Default)]
pub struct FakeTarget {
    delay: Duration,
    /// Return at most this many details per batch.
    detail_limit: Option<usize>,
    /// A batch containing any of these emails fails with HTTP 502.
    failing_emails: HashSet<String>,
    /// A batch containing any of these emails gets an undecodable response.
    garbled_emails: HashSet<String>,
    /// A batch containing any of these emails makes the task panic.
    panicking_emails: HashSet<String>,
    users: HashMap<String, TargetUser>,
    failing_lookups: HashSet<String>,
    user_count: Option<u64>,
    profile_count: Option<u64>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pub requests: Mutex<Vec<BulkImportRequest>>,
}

impl FakeTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_detail_limit(mut self, limit: usize) -> Self {
        self.detail_limit = Some(limit);
        self
    }

    pub fn failing_on_email(mut self, email: &str) -> Self {
        self.failing_emails.insert(email.to_string());
        self
    }

    pub fn garbled_on_email(mut self, email: &str) -> Self {
        self.garbled_emails.insert(email.to_string());
        self
    }

    pub fn panicking_on_email(mut self, email: &str) -> Self {
        self.panicking_emails.insert(email.to_string());
        self
    }

    pub fn with_user(mut self, id: &str, email: &str) -> Self {
        self.users.insert(
            id.to_string(),
            TargetUser {
                id: Some(id.to_string()),
                email: Some(email.to_string()),
                username: None,
            },
        );
        self
    }

    pub fn with_user_without_email(mut self, id: &str) -> Self {
        self.users.insert(
            id.to_string(),
            TargetUser {
                id: Some(id.to_string()),
                email: None,
                username: None,
            },
        );
        self
    }

    pub fn with_failing_lookup(mut self, id: &str) -> Self {
        self.failing_lookups.insert(id.to_string());
        self
    }

    pub fn with_counts(mut self, users: u64, profiles: u64) -> Self {
        self.user_count = Some(users);
        self.profile_count = Some(profiles);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

fn unavailable() -> TargetError {
    TargetError::status(StatusCode::SERVICE_UNAVAILABLE, "unavailable".to_string())
}

#[async_trait]
impl TargetApi for FakeTarget {
    async fn bulk_import(
        &self,
        request: &BulkImportRequest,
    ) -> Result<BulkImportResponse, TargetError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let emails: Vec<String> = request
            .users
            .iter()
            .map(|entry| entry.email.clone().unwrap_or_default())
            .collect();

        if emails.iter().any(|e| self.panicking_emails.contains(e)) {
            panic!("fake target crashed");
        }
        if emails.iter().any(|e| self.garbled_emails.contains(e)) {
            let err =
                serde_json::from_str::<BulkImportResponse>("<html>oops</html>").unwrap_err();
            return Err(TargetError::Decode(err));
        }
        if emails.iter().any(|e| self.failing_emails.contains(e)) {
            return Err(TargetError::status(
                StatusCode::BAD_GATEWAY,
                "bad gateway".to_string(),
            ));
        }

        let count = self
            .detail_limit
            .map_or(request.users.len(), |limit| limit.min(request.users.len()));
        let details = (0..count)
            .map(|i| ImportDetail {
                status: "created".to_string(),
                user_id: Some(format!("t-{}", emails[i])),
                reason: None,
            })
            .collect();

        Ok(BulkImportResponse {
            imported: request.users.len() as u64,
            details,
            ..BulkImportResponse::default()
        })
    }

    async fn count_users(&self) -> Result<u64, TargetError> {
        self.user_count.ok_or_else(unavailable)
    }

    async fn count_app_profiles(&self) -> Result<u64, TargetError> {
        self.profile_count.ok_or_else(unavailable)
    }

    async fn find_user(&self, id: &str) -> Result<Option<TargetUser>, TargetError> {
        if self.failing_lookups.contains(id) {
            return Err(unavailable());
        }
        Ok(self.users.get(id).cloned())
    }
}
