//! Translation of application records into recipes.
//!
//! [`RecipeBuilder::build`] is a pure function of the record and the builder's
//! immutable settings, which makes recipe equality a reliable change signal.

use crate::app::{ApplicationRecord, EnvironmentVariable};
use crate::error::RecipeError;
use crate::lifecycle::LifecycleBundles;
use crate::recipe::{HealthMonitor, LOG_SOURCE_NAME, LogConfig, Recipe, RecipeAction};

/// Replaced by the execution layer with its file server address.
pub const FILESERVER_URL_PLACEHOLDER: &str = "PLACEHOLDER_FILESERVER_URL";
pub const INSTANCE_INDEX_PLACEHOLDER: &str = "PLACEHOLDER_INSTANCE_INDEX";
pub const INSTANCE_GUID_PLACEHOLDER: &str = "PLACEHOLDER_INSTANCE_GUID";

pub const LIFECYCLE_DIR: &str = "/tmp/lifecycle";
pub const APP_DIR: &str = "/app";
pub const APP_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct RecipeBuilder {
    health_callback_addr: String,
    bundles: LifecycleBundles,
}

impl RecipeBuilder {
    pub fn new(health_callback_addr: impl Into<String>, bundles: LifecycleBundles) -> Self {
        Self {
            health_callback_addr: health_callback_addr.into(),
            bundles,
        }
    }

    pub fn build(&self, record: &ApplicationRecord) -> Result<Recipe, RecipeError> {
        record.process_guid.validate()?;
        if record.droplet_uri.trim().is_empty() {
            return Err(RecipeError::MissingDroplet(record.process_guid.clone()));
        }
        let bundle = self
            .bundles
            .bundle_for(&record.stack)
            .ok_or_else(|| RecipeError::unknown_stack(record.process_guid.clone(), &record.stack))?;

        let actions = vec![
            RecipeAction::Download {
                from: format!("{FILESERVER_URL_PLACEHOLDER}/v1/static/{bundle}"),
                to: LIFECYCLE_DIR.to_string(),
                extract: true,
            },
            RecipeAction::Download {
                from: record.droplet_uri.clone(),
                to: APP_DIR.to_string(),
                extract: true,
            },
            RecipeAction::Run {
                path: format!("{LIFECYCLE_DIR}/soldier"),
                args: vec![APP_DIR.to_string(), record.start_command.clone()],
                env: run_environment(record),
                nofile: nonzero(record.file_descriptors),
            },
        ];

        Ok(Recipe {
            process_guid: record.process_guid.clone(),
            instances: record.num_instances,
            stack: record.stack.clone(),
            memory_mb: record.memory_mb,
            disk_mb: record.disk_mb,
            file_descriptors: nonzero(record.file_descriptors),
            routes: record.routes.clone(),
            log: LogConfig {
                guid: record.log_guid.clone(),
                source_name: LOG_SOURCE_NAME.to_string(),
            },
            actions,
            monitor: self.health_monitor(record),
            annotation: record.etag.clone(),
        })
    }

    fn health_monitor(&self, record: &ApplicationRecord) -> HealthMonitor {
        let hook = |kind: &str| {
            format!(
                "http://{}/{kind}/{}/{INSTANCE_INDEX_PLACEHOLDER}/{INSTANCE_GUID_PLACEHOLDER}",
                self.health_callback_addr, record.process_guid
            )
        };

        HealthMonitor {
            path: format!("{LIFECYCLE_DIR}/spy"),
            args: vec![format!("-addr=:{APP_PORT}")],
            healthy_hook: hook("lrp_running"),
            unhealthy_hook: hook("lrp_unhealthy"),
            timeout_seconds: record.health_check_timeout_in_seconds,
            ports: vec![APP_PORT],
        }
    }
}

/// Record environment first, then the port variables every app receives.
fn run_environment(record: &ApplicationRecord) -> Vec<EnvironmentVariable> {
    let port = APP_PORT.to_string();
    let mut env = record.environment.clone();
    env.push(EnvironmentVariable::new("PORT", port.clone()));
    env.push(EnvironmentVariable::new("VCAP_APP_PORT", port));
    env.push(EnvironmentVariable::new("VCAP_APP_HOST", "0.0.0.0"));
    env
}

fn nonzero(value: u64) -> Option<u64> {
    (value > 0).then_some(value)
}
