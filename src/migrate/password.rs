//! Password hash algorithm detection
//!
//! Source systems rarely record which algorithm produced their hashes. The
//! target can only accept transferred hashes it knows how to verify, so the
//! pipeline samples the hashes it is about to send and reports what it finds.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Lazy-initialized regex for a complete bcrypt modular-crypt string
static BCRYPT_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_bcrypt_regex() -> &'static Regex {
    BCRYPT_REGEX.get_or_init(|| {
        Regex::new(r"^\$2[aby]\$\d{2}\$[./A-Za-z0-9]{53}$").expect("Invalid bcrypt regex")
    })
}

/// Ordering doubles as the tie-break in [`detect_from_sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Bcrypt,
    Argon2,
    Scrypt,
    Pbkdf2,
    Sha256,
    Md5,
    Sha1,
    Unknown,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashAlgorithm::Bcrypt => "bcrypt",
            HashAlgorithm::Argon2 => "argon2",
            HashAlgorithm::Scrypt => "scrypt",
            HashAlgorithm::Pbkdf2 => "pbkdf2",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Unknown => "unknown",
        })
    }
}

fn has_bcrypt_prefix(hash: &str) -> bool {
    hash.starts_with("$2a$") || hash.starts_with("$2b$") || hash.starts_with("$2y$")
}

/// Classify a single stored hash.
///
/// Prefixed formats are recognised by their prefix; bare digests by the
/// number of hex characters left after stripping everything else.
pub fn detect_algorithm(hash: &str) -> HashAlgorithm {
    if hash.is_empty() {
        return HashAlgorithm::Unknown;
    }
    if has_bcrypt_prefix(hash) {
        return HashAlgorithm::Bcrypt;
    }
    if hash.starts_with("$argon2") {
        return HashAlgorithm::Argon2;
    }
    if hash.starts_with("$scrypt") {
        return HashAlgorithm::Scrypt;
    }
    if hash.starts_with("pbkdf2") {
        return HashAlgorithm::Pbkdf2;
    }

    match hash.chars().filter(char::is_ascii_hexdigit).count() {
        64 => HashAlgorithm::Sha256,
        32 => HashAlgorithm::Md5,
        40 => HashAlgorithm::Sha1,
        _ => HashAlgorithm::Unknown,
    }
}

/// Most common algorithm across a sample; `Unknown` for an empty sample.
pub fn detect_from_sample<'a, I>(hashes: I) -> HashAlgorithm
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<HashAlgorithm, usize> = HashMap::new();
    for hash in hashes {
        *counts.entry(detect_algorithm(hash)).or_default() += 1;
    }

    counts
        .into_iter()
        .max_by(|(a, a_count), (b, b_count)| a_count.cmp(b_count).then_with(|| b.cmp(a)))
        .map(|(algorithm, _)| algorithm)
        .unwrap_or(HashAlgorithm::Unknown)
}

/// True only for a structurally complete bcrypt hash.
pub fn is_bcrypt_compatible(hash: &str) -> bool {
    has_bcrypt_prefix(hash) && get_bcrypt_regex().is_match(hash)
}
