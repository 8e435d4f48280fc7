//! Batched delivery of deduplicated records to the identity service.
//!
//! 1. **Entry building** (`entry_builder`) - Maps source records to wire entries
//! 2. **Coordination** (`coordinator`) - Batches, bounded concurrency, reconciliation
//! 3. **Statistics** (`stats`) - Tracks import counters
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use user_migrator::migrate::import::BulkImporter;
//!
//! let importer = BulkImporter::from_config(target, &config);
//! let results = importer.import_all(&outcome.records).await;
//!
//! println!("{} errors", importer.stats().errors);
//! ```

pub mod coordinator;
pub mod entry_builder;
pub mod stats;

pub use coordinator::{BatchError, BatchOutcome, BulkImporter, import_batch, reconcile};
pub use entry_builder::{build_import_entry, synthesize_username};
pub use stats::ImportStats;
