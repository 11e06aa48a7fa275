//! # bulksync-registry
//!
//! Client side of the registry bulk listing API.
//!
//! - [`RegistryFetcher`]: fetches one page for a continuation token
//! - [`CcBulkFetcher`]: the HTTP implementation
//! - [`ScriptedRegistry`]: in-process implementation serving fixed pages
//! - [`listing`]: walks every page of one listing as a lazy [`BatchStream`]

mod batch;
mod client;
mod error;
mod fetcher;
mod memory;
mod stream;

pub use batch::{BulkToken, FetchBatch};
pub use client::{CcBulkFetcher, RegistryConfig};
pub use error::{FetchError, RegistryError};
pub use fetcher::RegistryFetcher;
pub use memory::ScriptedRegistry;
pub use stream::{BatchStream, listing};

/// Type alias for a shared fetcher trait object.
pub type DynFetcher = std::sync::Arc<dyn RegistryFetcher>;
