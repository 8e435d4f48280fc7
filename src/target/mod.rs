//! Identity service access: wire types, the `TargetApi` seam and its HTTP
//! implementation.

pub mod client;
pub mod error;
pub mod types;

pub use client::TargetClient;
pub use error::TargetError;
pub use types::{
    BulkImportRequest, BulkImportResponse, CountResponse, ImportDetail, ImportEntry, TargetUser,
};

use async_trait::async_trait;

/// Operations the migration core needs from the identity service.
///
/// Implemented over HTTP by [`TargetClient`]; tests substitute in-process
/// fakes.
#[async_trait]
pub trait TargetApi: Send + Sync {
    /// Submit one batch. Response details are ordered like `request.users`.
    async fn bulk_import(
        &self,
        request: &BulkImportRequest,
    ) -> Result<BulkImportResponse, TargetError>;

    /// Total users known to the service.
    async fn count_users(&self) -> Result<u64, TargetError>;

    /// Users with a profile in the configured application.
    async fn count_app_profiles(&self) -> Result<u64, TargetError>;

    /// Look up a user by id. `Ok(None)` means the service answered not-found.
    async fn find_user(&self, id: &str) -> Result<Option<TargetUser>, TargetError>;
}
