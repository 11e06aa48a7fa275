//! The capability trait every desired-state store backend implements.

use async_trait::async_trait;
use bulksync_core::{ProcessGuid, Recipe};

use crate::error::StoreError;
use crate::types::{DesiredStateRecord, StoreVersion};

/// Key-value view of the coordination store, keyed by process guid.
///
/// Writes are per key and carry compare-and-set semantics, so redundant
/// reconcilers rely on the store for conflict handling rather than on locks.
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait DesiredStateStore: Send + Sync {
    /// Lists every desired-state record currently stored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the store cannot be reached and
    /// `StoreError::Malformed` if a stored value cannot be decoded.
    async fn list(&self) -> Result<Vec<DesiredStateRecord>, StoreError>;

    /// Writes a recipe under its process guid.
    ///
    /// With `expected = None` the write only succeeds if no record exists.
    /// With `expected = Some(v)` it only succeeds if the stored version is `v`.
    /// Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` or `StoreError::VersionConflict`
    /// when the precondition fails.
    async fn upsert(
        &self,
        recipe: &Recipe,
        expected: Option<StoreVersion>,
    ) -> Result<StoreVersion, StoreError>;

    /// Deletes the record for a process guid.
    ///
    /// Deleting a missing record succeeds. With `expected = Some(v)` the
    /// delete only succeeds if the stored version is `v`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::VersionConflict` when the precondition fails.
    async fn delete(
        &self,
        process_guid: &ProcessGuid,
        expected: Option<StoreVersion>,
    ) -> Result<(), StoreError>;

    /// Returns the name of this store backend for logging.
    fn backend_name(&self) -> &'static str;
}
