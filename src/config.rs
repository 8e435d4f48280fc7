use crate::error::{MigrationError, MigrationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_duration_millis(key: &str, default_millis: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default_millis))
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: FromStr<Err = MigrationError>>(key: &str, default: T) -> MigrationResult<T> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value.parse(),
        _ => Ok(default),
    }
}

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Which record fields feed the dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    Email,
    Phone,
    Username,
    /// Email when present, otherwise phone.
    EmailOrPhone,
    /// Username when present, otherwise email.
    UsernameOrEmail,
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DedupKey::Email => "email",
            DedupKey::Phone => "phone",
            DedupKey::Username => "username",
            DedupKey::EmailOrPhone => "email_or_phone",
            DedupKey::UsernameOrEmail => "username_or_email",
        })
    }
}

impl FromStr for DedupKey {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(DedupKey::Email),
            "phone" => Ok(DedupKey::Phone),
            "username" => Ok(DedupKey::Username),
            "email_or_phone" => Ok(DedupKey::EmailOrPhone),
            "username_or_email" => Ok(DedupKey::UsernameOrEmail),
            other => Err(MigrationError::config(format!(
                "unsupported dedup key '{other}'"
            ))),
        }
    }
}

/// What to do when two records share a dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    None,
    KeepFirst,
    KeepLatest,
    Error,
}

impl fmt::Display for DedupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DedupStrategy::None => "none",
            DedupStrategy::KeepFirst => "keep_first",
            DedupStrategy::KeepLatest => "keep_latest",
            DedupStrategy::Error => "error",
        })
    }
}

impl FromStr for DedupStrategy {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(DedupStrategy::None),
            "keep_first" => Ok(DedupStrategy::KeepFirst),
            "keep_latest" => Ok(DedupStrategy::KeepLatest),
            "error" => Ok(DedupStrategy::Error),
            other => Err(MigrationError::config(format!(
                "unknown dedup strategy '{other}'"
            ))),
        }
    }
}

/// Conflict directive sent with every bulk-import request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    Skip,
    Update,
    Error,
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictStrategy::Skip => "skip",
            ConflictStrategy::Update => "update",
            ConflictStrategy::Error => "error",
        })
    }
}

impl FromStr for ConflictStrategy {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(ConflictStrategy::Skip),
            "update" => Ok(ConflictStrategy::Update),
            "error" => Ok(ConflictStrategy::Error),
            other => Err(MigrationError::config(format!(
                "unknown conflict strategy '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordStrategy {
    /// Send source hashes so users keep their passwords.
    Transfer,
    ForceReset,
    None,
}

impl FromStr for PasswordStrategy {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transfer" => Ok(PasswordStrategy::Transfer),
            "force_reset" => Ok(PasswordStrategy::ForceReset),
            "none" => Ok(PasswordStrategy::None),
            other => Err(MigrationError::config(format!(
                "unknown password strategy '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    PreserveUuid,
    GenerateNew,
}

impl FromStr for IdStrategy {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve_uuid" => Ok(IdStrategy::PreserveUuid),
            "generate_new" => Ok(IdStrategy::GenerateNew),
            other => Err(MigrationError::config(format!(
                "unknown id strategy '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupConfig {
    pub key: DedupKey,
    pub strategy: DedupStrategy,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            key: DedupKey::Email,
            strategy: DedupStrategy::KeepLatest,
        }
    }
}

/// Controls how source records are turned into import entries.
#[derive(Debug, Clone)]
pub struct EntryConfig {
    pub id_strategy: IdStrategy,
    pub password_strategy: PasswordStrategy,
    /// Algorithm the source is expected to use; compared against detection.
    pub password_algorithm: String,
    /// Source role id to target role name.
    pub role_mapping: BTreeMap<i32, String>,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            id_strategy: IdStrategy::PreserveUuid,
            password_strategy: PasswordStrategy::Transfer,
            password_algorithm: "bcrypt".to_string(),
            role_mapping: BTreeMap::new(),
        }
    }
}

/// Connection settings for the identity service.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub base_url: String,
    pub api_key: String,
    pub application_id: String,
    pub request_timeout: Duration,
}

impl TargetConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("TARGET_BASE_URL", "http://localhost:3000"),
            api_key: env_string("TARGET_API_KEY", ""),
            application_id: env_string("TARGET_APPLICATION_ID", ""),
            request_timeout: env_duration_millis("TARGET_TIMEOUT_MS", DEFAULT_TIMEOUT_MS),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_key: String::new(),
            application_id: String::new(),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Run-scoped settings for one migration.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub batch_size: usize,
    pub workers: usize,
    pub dry_run: bool,
    pub dedup: DedupConfig,
    pub on_conflict: ConflictStrategy,
    pub entry: EntryConfig,
    pub target: TargetConfig,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            dry_run: true,
            dedup: DedupConfig::default(),
            on_conflict: ConflictStrategy::Skip,
            entry: EntryConfig::default(),
            target: TargetConfig::default(),
        }
    }
}

impl MigrationConfig {
    /// Load configuration from `MIGRATION_*` and `TARGET_*` variables.
    ///
    /// Unknown enum values fail here, before any record is read.
    pub fn from_env() -> MigrationResult<Self> {
        let dedup = DedupConfig {
            key: env_parsed("MIGRATION_DEDUP_KEY", DedupKey::Email)?,
            strategy: env_parsed("MIGRATION_DEDUP_STRATEGY", DedupStrategy::KeepLatest)?,
        };

        let role_mapping = match env::var("MIGRATION_ROLE_MAP") {
            Ok(raw) => parse_role_mapping(&raw)?,
            Err(_) => BTreeMap::new(),
        };

        let entry = EntryConfig {
            id_strategy: env_parsed("MIGRATION_ID_STRATEGY", IdStrategy::PreserveUuid)?,
            password_strategy: env_parsed(
                "MIGRATION_PASSWORD_STRATEGY",
                PasswordStrategy::Transfer,
            )?,
            password_algorithm: env_string("MIGRATION_PASSWORD_ALGORITHM", "bcrypt"),
            role_mapping,
        };

        let config = Self {
            batch_size: env_usize("MIGRATION_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            workers: env_usize("MIGRATION_WORKERS", DEFAULT_WORKERS),
            dry_run: env_bool("MIGRATION_DRY_RUN", true),
            dedup,
            on_conflict: env_parsed("MIGRATION_ON_CONFLICT", ConflictStrategy::Skip)?,
            entry,
            target: TargetConfig::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MigrationResult<()> {
        if self.batch_size == 0 {
            return Err(MigrationError::config("batch size must be at least 1"));
        }
        if self.workers == 0 {
            return Err(MigrationError::config("workers must be at least 1"));
        }
        Ok(())
    }
}

/// Parse `1:admin,2:editor` into a role mapping. Later entries for the same
/// id win.
pub fn parse_role_mapping(raw: &str) -> MigrationResult<BTreeMap<i32, String>> {
    let mut mapping = BTreeMap::new();

    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((id, name)) = pair.split_once(':') else {
            return Err(MigrationError::config(format!(
                "invalid role mapping entry '{pair}', expected id:name"
            )));
        };

        let id = id.trim().parse::<i32>().map_err(|_| {
            MigrationError::config(format!("invalid role id '{}' in role mapping", id.trim()))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(MigrationError::config(format!(
                "empty role name for role id {id}"
            )));
        }

        mapping.insert(id, name.to_string());
    }

    Ok(mapping)
}
