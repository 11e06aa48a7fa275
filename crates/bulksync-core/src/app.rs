use serde::{Deserialize, Serialize};

use crate::id::ProcessGuid;

/// A single `name=value` environment entry. Order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

impl EnvironmentVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Desired state of one application, as reported by the registry bulk API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub process_guid: ProcessGuid,

    pub droplet_uri: String,

    /// Selects the lifecycle bundle used to run the app
    pub stack: String,

    #[serde(default)]
    pub start_command: String,

    #[serde(default)]
    pub environment: Vec<EnvironmentVariable>,

    pub memory_mb: u64,

    pub disk_mb: u64,

    /// 0 means the platform default
    #[serde(default)]
    pub file_descriptors: u64,

    pub num_instances: u32,

    #[serde(default)]
    pub routes: Vec<String>,

    #[serde(default)]
    pub log_guid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_timeout_in_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}
