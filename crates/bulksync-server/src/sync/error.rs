use bulksync_core::ProcessGuid;
use bulksync_registry::FetchError;
use bulksync_storage::StoreError;

/// Why a cycle stopped before completing its listing.
///
/// An aborted cycle never computes deletes.
#[derive(Debug, thiserror::Error)]
pub enum CycleAbort {
    #[error("store listing failed: {0}")]
    StoreList(#[source] StoreError),

    #[error("registry fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("registry listed {process_guid} more than once with different contents")]
    InconsistentListing { process_guid: ProcessGuid },

    #[error("registry listing ended before its final page")]
    IncompleteListing,

    #[error("cycle cancelled")]
    Cancelled,
}

impl CycleAbort {
    /// Short label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StoreList(_) => "store_list",
            Self::Fetch(e) => e.kind(),
            Self::InconsistentListing { .. } => "inconsistent_listing",
            Self::IncompleteListing => "incomplete_listing",
            Self::Cancelled => "cancelled",
        }
    }
}
