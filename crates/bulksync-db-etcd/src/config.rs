//! Configuration types for the etcd store backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the etcd store backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtcdConfig {
    /// Cluster member addresses (`http://ip:port`), tried in order.
    pub cluster: Vec<String>,

    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            cluster: vec!["http://127.0.0.1:4001".into()],
            request_timeout_ms: 5000,
        }
    }
}

impl EtcdConfig {
    /// Creates a configuration for the given cluster members.
    #[must_use]
    pub fn new(cluster: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            cluster: cluster.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Parses a comma-separated member list such as `http://a:4001,http://b:4001`.
    #[must_use]
    pub fn from_comma_separated(cluster: &str) -> Self {
        Self::new(
            cluster
                .split(',')
                .map(str::trim)
                .filter(|member| !member.is_empty()),
        )
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout_ms(mut self, timeout: u64) -> Self {
        self.request_timeout_ms = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
