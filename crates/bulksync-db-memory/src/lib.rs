//! In-memory desired-state store for bulksync.
//!
//! This crate provides an in-memory implementation of the `DesiredStateStore`
//! trait from `bulksync-storage`. It backs the reconciliation engine's tests.
//!
//! # Example
//!
//! ```ignore
//! use bulksync_db_memory::InMemoryStore;
//! use bulksync_storage::DesiredStateStore;
//!
//! let store = InMemoryStore::new();
//! let version = store.upsert(&recipe, None).await?;
//! store.delete(&recipe.process_guid, Some(version)).await?;
//! ```

pub mod storage;

pub use bulksync_storage::{DesiredStateStore, StoreError};
pub use storage::InMemoryStore;
