//! User migration core.
//!
//! # Architecture Overview
//!
//! - **`dedup`**: Collapses source records that share a normalized key,
//!   according to the configured strategy, and records every conflict.
//!
//! - **`password`**: Classifies stored password hashes so transferred hashes
//!   can be checked against what the target is told to expect.
//!
//! - **`import`**: Batches deduplicated records into bulk-import requests,
//!   submits them with bounded concurrency and reconciles the responses.
//!
//! - **`verifier`**: Compares counts and a sample of users with the target
//!   after import.
//!
//! - **`pipeline`**: Runs the steps above and assembles the report.
//!
//! ## Data Flow
//!
//! ```text
//! SourceRecord* -> Deduplicator -> BulkImporter -> Verifier -> MigrationReport
//! ```

pub mod dedup;
pub mod import;
pub mod password;
pub mod pipeline;
pub mod verifier;

pub use dedup::{DedupOutcome, DedupStats, Deduplicator, dedup_key};
pub use import::{BulkImporter, ImportStats};
pub use password::HashAlgorithm;
pub use pipeline::{
    ConflictSummary, MigrationPipeline, MigrationReport, MigrationStep, VerificationInput,
};
pub use verifier::{Verifier, draw_sample};
