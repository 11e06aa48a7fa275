use bulksync_core::ApplicationRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque continuation cursor handed back by the registry.
///
/// The client only echoes it on the next call; its shape belongs to the
/// registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BulkToken(pub Value);

impl BulkToken {
    /// Cursor for the first page of a listing.
    pub fn initial() -> Self {
        Self(Value::Object(Default::default()))
    }
}

impl Default for BulkToken {
    fn default() -> Self {
        Self::initial()
    }
}

/// One page of a registry listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchBatch {
    pub records: Vec<ApplicationRecord>,
    /// Cursor for the following page; `None` marks the end of the listing.
    pub next: Option<BulkToken>,
}

impl FetchBatch {
    pub fn is_final(&self) -> bool {
        self.next.is_none()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
