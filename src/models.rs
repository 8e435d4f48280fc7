use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ===== Source Models =====

/// One account row from the source database, already mapped to canonical
/// field names by the exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Source-native identifier; reused as the target id when it is a UUID
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    /// Stored hash, algorithm unknown until detected
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub phone_verified: bool,
    /// Creation time, used by `KeepLatest` dedup
    pub created_at: Option<DateTime<Utc>>,
    /// Source role ids, translated through the configured role mapping
    #[serde(default)]
    pub role_ids: Vec<i32>,
}

impl SourceRecord {
    /// A record with only an id; everything else absent or at its default.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            username: None,
            phone: None,
            password_hash: None,
            full_name: None,
            is_active: true,
            email_verified: false,
            phone_verified: false,
            created_at: None,
            role_ids: Vec::new(),
        }
    }
}

/// A `{id, email}` pair drawn from the source for spot-checking the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledUser {
    pub id: String,
    /// Source email; `None` for accounts keyed by phone or username only
    pub email: Option<String>,
}

/// Two source records that produced the same dedup key.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictRecord {
    pub key: String,
    /// The canonical record at the time the duplicate was seen.
    pub existing: SourceRecord,
    pub duplicate: SourceRecord,
}

// ===== Import Models =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Created,
    Existing,
    Skipped,
    Updated,
    Error,
}

impl ImportStatus {
    /// Map a status string reported by the target.
    ///
    /// Anything unrecognised (including the service's own `"imported"`)
    /// maps to `Created`.
    pub fn from_target(status: &str) -> Self {
        match status {
            "created" => ImportStatus::Created,
            "existing" => ImportStatus::Existing,
            "skipped" => ImportStatus::Skipped,
            "updated" => ImportStatus::Updated,
            "error" => ImportStatus::Error,
            _ => ImportStatus::Created,
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImportStatus::Created => "created",
            ImportStatus::Existing => "existing",
            ImportStatus::Skipped => "skipped",
            ImportStatus::Updated => "updated",
            ImportStatus::Error => "error",
        })
    }
}

/// Outcome for a single submitted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    /// Id of the submitted source record
    pub source_id: String,
    /// Id assigned by the target, when it reported one
    pub target_id: Option<String>,
    pub status: ImportStatus,
    /// Target-supplied reason, or the shared failure note of a failed batch
    pub note: String,
}

impl ImportResult {
    pub fn error(source_id: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: None,
            status: ImportStatus::Error,
            note: note.into(),
        }
    }
}

// ===== Verification Models =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationCheck {
    /// Check label, e.g. "User count"
    pub name: String,
    /// Value taken from the source
    pub expected: u64,
    /// Value reported by the target (0 when the call failed)
    pub actual: u64,
    /// `expected == actual`
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingUser {
    pub user_id: String,
    /// Source email, empty when the source had none
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMismatch {
    pub user_id: String,
    /// Name of the compared field
    pub field: String,
    /// Source value, empty when absent
    pub expected: String,
    /// Target value, empty when absent
    pub actual: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Count checks in the order they ran
    pub checks: Vec<VerificationCheck>,
    /// Sampled users the target does not have (or could not be looked up)
    pub missing_users: Vec<MissingUser>,
    /// Sampled users whose target fields differ from the source
    pub mismatches: Vec<FieldMismatch>,
}

impl VerificationReport {
    /// Record an equality check.
    pub fn add_check(&mut self, name: impl Into<String>, expected: u64, actual: u64) {
        self.checks.push(VerificationCheck {
            name: name.into(),
            expected,
            actual,
            passed: expected == actual,
        });
    }

    pub fn add_missing(&mut self, user_id: impl Into<String>, email: impl Into<String>) {
        self.missing_users.push(MissingUser {
            user_id: user_id.into(),
            email: email.into(),
        });
    }

    pub fn add_mismatch(
        &mut self,
        user_id: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) {
        self.mismatches.push(FieldMismatch {
            user_id: user_id.into(),
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        });
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
            && self.missing_users.is_empty()
            && self.mismatches.is_empty()
    }
}
