//! etcd storage backend for bulksync.
//!
//! This crate provides an etcd v2 implementation of the `DesiredStateStore`
//! trait from `bulksync-storage`, speaking the keys API over reqwest.
//!
//! # Example
//!
//! ```ignore
//! use bulksync_db_etcd::{EtcdConfig, EtcdStore};
//! use bulksync_storage::DesiredStateStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EtcdConfig::from_comma_separated("http://10.0.0.1:4001,http://10.0.0.2:4001")
//!     .with_request_timeout_ms(2000);
//!
//! let store = EtcdStore::connect(&config).await?;
//! let records = store.list().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Cluster addresses and request timeout
//! - [`error`]: etcd error codes and their store error mapping
//! - [`storage`]: The `DesiredStateStore` implementation

pub mod config;
pub mod error;
pub mod storage;

pub use config::EtcdConfig;
pub use error::{EtcdApiError, EtcdError};
pub use storage::{DESIRED_STATE_ROOT, EtcdStore};
