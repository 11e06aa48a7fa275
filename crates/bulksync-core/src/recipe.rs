//! Executable run specification derived from an [`ApplicationRecord`].
//!
//! A [`Recipe`] is never edited on its own: it is rebuilt from its source
//! record whenever the record changes. Field order and collection types are
//! fixed, so two equal recipes always serialize to the same bytes.
//!
//! [`ApplicationRecord`]: crate::app::ApplicationRecord

use serde::{Deserialize, Serialize};

use crate::app::EnvironmentVariable;
use crate::id::ProcessGuid;

pub const LOG_SOURCE_NAME: &str = "App";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub process_guid: ProcessGuid,
    pub instances: u32,
    pub stack: String,
    pub memory_mb: u64,
    pub disk_mb: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_descriptors: Option<u64>,
    #[serde(default)]
    pub routes: Vec<String>,
    pub log: LogConfig,
    pub actions: Vec<RecipeAction>,
    pub monitor: HealthMonitor,
    /// Registry etag of the source record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl Recipe {
    /// Serializes the recipe in its canonical form.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub guid: String,
    pub source_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecipeAction {
    Download {
        from: String,
        to: String,
        extract: bool,
    },
    Run {
        path: String,
        args: Vec<String>,
        #[serde(default)]
        env: Vec<EnvironmentVariable>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nofile: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthMonitor {
    pub path: String,
    pub args: Vec<String>,
    pub healthy_hook: String,
    pub unhealthy_hook: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    pub ports: Vec<u16>,
}
