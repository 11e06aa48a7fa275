//! # bulksync-storage
//!
//! Store abstraction for desired-state records.
//!
//! This crate defines the capability trait and types that all store backends
//! implement. It does not contain any implementations; those live in the
//! `bulksync-db-*` crates.
//!
//! ## Example
//!
//! ```ignore
//! use bulksync_storage::{DesiredStateStore, StoreError};
//!
//! async fn count_instances(store: &dyn DesiredStateStore) -> Result<u32, StoreError> {
//!     let records = store.list().await?;
//!     Ok(records.iter().map(|r| r.instances()).sum())
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StoreError};
pub use traits::DesiredStateStore;
pub use types::{DesiredStateRecord, StoreVersion};

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn DesiredStateStore>;
