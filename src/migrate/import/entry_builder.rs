//! Turns source records into bulk-import entries.

use crate::config::{EntryConfig, IdStrategy, PasswordStrategy};
use crate::models::SourceRecord;
use crate::target::ImportEntry;
use uuid::Uuid;

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Build the wire entry for one record.
///
/// Only present fields are set. A missing username is derived from the email
/// local part, then from the phone digits. Role ids without a mapping are
/// dropped.
pub fn build_import_entry(record: &SourceRecord, config: &EntryConfig) -> ImportEntry {
    let email = present(record.email.as_deref());
    let phone = present(record.phone.as_deref());
    let username = present(record.username.as_deref())
        .or_else(|| synthesize_username(email.as_deref(), phone.as_deref()));

    let id = match config.id_strategy {
        IdStrategy::PreserveUuid => Uuid::parse_str(record.id.trim())
            .ok()
            .map(|uuid| uuid.to_string()),
        IdStrategy::GenerateNew => None,
    };

    let password_hash_import = match config.password_strategy {
        PasswordStrategy::Transfer => present(record.password_hash.as_deref()),
        PasswordStrategy::ForceReset | PasswordStrategy::None => None,
    };

    let app_roles = record
        .role_ids
        .iter()
        .filter_map(|role_id| config.role_mapping.get(role_id).cloned())
        .collect();

    ImportEntry {
        id,
        email,
        username,
        phone,
        full_name: present(record.full_name.as_deref()),
        password_hash_import,
        is_active: record.is_active,
        email_verified: record.email_verified,
        phone_verified: record.phone_verified,
        skip_email_verification: true,
        app_roles,
    }
}

/// Username fallback: email local part, else the digits of the phone number.
pub fn synthesize_username(email: Option<&str>, phone: Option<&str>) -> Option<String> {
    if let Some(local) = email
        .and_then(|e| e.split('@').next())
        .filter(|local| !local.is_empty())
    {
        return Some(local.to_string());
    }

    let digits: String = phone?.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() { None } else { Some(digits) }
}
