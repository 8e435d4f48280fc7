use crate::target::TargetError;
use thiserror::Error;

pub type MigrationResult<T> = Result<T, MigrationError>;

/// Errors that abort a migration run.
///
/// Batch and lookup failures are not represented here: those are recovered
/// locally and surface as per-record results or verification entries.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("duplicate user for key '{key}': existing_id={existing_id}, duplicate_id={duplicate_id}")]
    DuplicateKey {
        key: String,
        existing_id: String,
        duplicate_id: String,
    },
    #[error("target error: {0}")]
    Target(#[from] TargetError),
}

impl MigrationError {
    pub fn config(message: impl Into<String>) -> Self {
        MigrationError::Config(message.into())
    }
}
