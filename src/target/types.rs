//! Wire shapes for the identity service's admin API.

use crate::config::ConflictStrategy;
use serde::{Deserialize, Serialize};

/// One user in a bulk-import request. Absent fields are not serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash_import: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub skip_email_verification: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub app_roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkImportRequest {
    pub users: Vec<ImportEntry>,
    pub on_conflict: ConflictStrategy,
}

/// Per-record outcome, parallel to the request's `users` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDetail {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkImportResponse {
    #[serde(default)]
    pub imported: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub details: Vec<ImportDetail>,
}

/// Paginated list envelope; only the total is read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountResponse {
    #[serde(default)]
    pub total: u64,
}

/// The subset of a target user the verifier compares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}
