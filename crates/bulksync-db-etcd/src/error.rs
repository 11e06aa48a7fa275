//! Error types for the etcd store backend.

use bulksync_storage::StoreError;
use serde::Deserialize;

/// etcd error code for a missing key.
pub const ETCD_KEY_NOT_FOUND: u64 = 100;

/// etcd error code for a failed `prevIndex`/`prevValue` comparison.
pub const ETCD_TEST_FAILED: u64 = 101;

/// etcd error code for `prevExist=false` on an existing key.
pub const ETCD_NODE_EXIST: u64 = 105;

/// Error body returned by the etcd v2 keys API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcdApiError {
    pub error_code: u64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub cause: Option<String>,
}

impl EtcdApiError {
    /// Maps an etcd error for `key` onto the store error taxonomy.
    pub fn into_store_error(self, key: &str, expected: Option<u64>) -> StoreError {
        match self.error_code {
            ETCD_NODE_EXIST => StoreError::already_exists(key),
            ETCD_TEST_FAILED | ETCD_KEY_NOT_FOUND => StoreError::version_conflict(
                key,
                expected.map_or_else(|| "none".to_string(), |v| v.to_string()),
            ),
            code => StoreError::internal(format!(
                "etcd error {code} on {key}: {}",
                self.message
            )),
        }
    }
}

/// Errors constructing the etcd backend.
#[derive(Debug, thiserror::Error)]
pub enum EtcdError {
    /// A cluster address could not be used.
    #[error("Invalid cluster address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    /// No cluster addresses were configured.
    #[error("etcd cluster address list is empty")]
    EmptyCluster,

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl EtcdError {
    /// Creates a new invalid address error.
    #[must_use]
    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }
}

impl From<EtcdError> for StoreError {
    fn from(err: EtcdError) -> Self {
        match err {
            EtcdError::Client(e) => StoreError::unavailable(e.to_string()),
            other => StoreError::internal(other.to_string()),
        }
    }
}
