use bulksync_core::BundleMappingError;
use bulksync_registry::RegistryError;
use bulksync_storage::StoreError;

/// Failures that stop the process before the first cycle.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid lifecycle bundle mapping: {0}")]
    Bundles(#[from] BundleMappingError),

    #[error("registry client error: {0}")]
    Registry(#[from] RegistryError),

    #[error("desired state store unavailable: {0}")]
    Store(#[from] StoreError),
}

impl StartupError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        2
    }
}
