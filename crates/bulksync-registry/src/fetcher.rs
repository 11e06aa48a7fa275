use async_trait::async_trait;

use crate::batch::{BulkToken, FetchBatch};
use crate::error::FetchError;

/// Fetches single pages of the registry listing.
///
/// Each call is independent: the same token may be fetched again after a
/// failure. Per-call deadlines are enforced by [`listing`](crate::listing).
#[async_trait]
pub trait RegistryFetcher: Send + Sync {
    async fn fetch_batch(&self, token: &BulkToken) -> Result<FetchBatch, FetchError>;

    /// Name of the registry for logging.
    fn name(&self) -> &'static str;
}
