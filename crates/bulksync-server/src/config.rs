use std::collections::BTreeMap;
use std::time::Duration;

use bulksync_core::{BundleMappingError, LifecycleBundles};
use bulksync_db_etcd::EtcdConfig;
use bulksync_registry::RegistryConfig;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    /// Stack to lifecycle bundle mapping
    #[serde(default)]
    pub lifecycle: LifecycleSettings,
    #[serde(default)]
    pub health: HealthSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Registry validations
        if self.registry.base_url.is_empty() {
            return Err("registry.base_url is required".into());
        }
        let url = Url::parse(&self.registry.base_url)
            .map_err(|e| format!("registry.base_url is invalid: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err("registry.base_url must use http or https".into());
        }
        if self.registry.batch_size == 0 {
            return Err("registry.batch_size must be > 0".into());
        }
        if self.registry.fetch_timeout_ms == 0 {
            return Err("registry.fetch_timeout_ms must be > 0".into());
        }
        // Store validations
        if self.store.cluster.iter().all(|member| member.trim().is_empty()) {
            return Err("store.cluster must list at least one address".into());
        }
        if self.store.request_timeout_ms == 0 {
            return Err("store.request_timeout_ms must be > 0".into());
        }
        if self.store.max_concurrent_writes == 0 {
            return Err("store.max_concurrent_writes must be > 0".into());
        }
        // Sync validation
        if self.sync.polling_interval_ms == 0 {
            return Err("sync.polling_interval_ms must be > 0".into());
        }
        // Lifecycle validation
        self.lifecycle_bundles()
            .map_err(|e| format!("lifecycle.bundles: {e}"))?;
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn lifecycle_bundles(&self) -> Result<LifecycleBundles, BundleMappingError> {
        LifecycleBundles::new(self.lifecycle.bundles.clone())
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            base_url: self.registry.base_url.clone(),
            username: self.registry.username.clone(),
            password: self.registry.password.clone(),
            batch_size: self.registry.batch_size,
            fetch_timeout: self.fetch_timeout(),
            skip_cert_verify: self.registry.skip_cert_verify,
        }
    }

    pub fn etcd_config(&self) -> EtcdConfig {
        EtcdConfig::new(
            self.store
                .cluster
                .iter()
                .map(|member| member.trim())
                .filter(|member| !member.is_empty()),
        )
        .with_request_timeout_ms(self.store.request_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.registry.fetch_timeout_ms)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.sync.polling_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Operational escape hatch for self-signed registries
    #[serde(default)]
    pub skip_cert_verify: bool,
}

fn default_batch_size() -> u32 {
    500
}
fn default_fetch_timeout_ms() -> u64 {
    30_000
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            batch_size: default_batch_size(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            skip_cert_verify: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_cluster")]
    pub cluster: Vec<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_concurrent_writes")]
    pub max_concurrent_writes: usize,
}

fn default_cluster() -> Vec<String> {
    vec!["http://127.0.0.1:4001".into()]
}
fn default_request_timeout_ms() -> u64 {
    5_000
}
fn default_max_concurrent_writes() -> usize {
    10
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            cluster: default_cluster(),
            request_timeout_ms: default_request_timeout_ms(),
            max_concurrent_writes: default_max_concurrent_writes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
}

fn default_polling_interval_ms() -> u64 {
    30_000
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            polling_interval_ms: default_polling_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LifecycleSettings {
    #[serde(default)]
    pub bundles: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSettings {
    /// Address workload health callbacks are routed to, relative to the
    /// executor
    #[serde(default = "default_callback_addr")]
    pub callback_addr: String,
}

fn default_callback_addr() -> String {
    "127.0.0.1:20515".into()
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            callback_addr: default_callback_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Values supplied on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub registry_base_url: Option<String>,
    pub registry_username: Option<String>,
    pub registry_password: Option<String>,
    pub batch_size: Option<u32>,
    pub fetch_timeout_ms: Option<u64>,
    pub skip_cert_verify: Option<bool>,
    /// Comma-separated etcd member addresses
    pub store_cluster: Option<String>,
    pub polling_interval_ms: Option<u64>,
    pub health_callback_addr: Option<String>,
    /// JSON object mapping stacks to lifecycle bundles
    pub lifecycle_bundles: Option<String>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    fn apply(&self, cfg: &mut AppConfig) -> Result<(), String> {
        if let Some(url) = &self.registry_base_url {
            cfg.registry.base_url = url.clone();
        }
        if let Some(username) = &self.registry_username {
            cfg.registry.username = username.clone();
        }
        if let Some(password) = &self.registry_password {
            cfg.registry.password = password.clone();
        }
        if let Some(batch_size) = self.batch_size {
            cfg.registry.batch_size = batch_size;
        }
        if let Some(timeout) = self.fetch_timeout_ms {
            cfg.registry.fetch_timeout_ms = timeout;
        }
        if let Some(skip) = self.skip_cert_verify {
            cfg.registry.skip_cert_verify = skip;
        }
        if let Some(cluster) = &self.store_cluster {
            cfg.store.cluster = EtcdConfig::from_comma_separated(cluster).cluster;
        }
        if let Some(interval) = self.polling_interval_ms {
            cfg.sync.polling_interval_ms = interval;
        }
        if let Some(addr) = &self.health_callback_addr {
            cfg.health.callback_addr = addr.clone();
        }
        if let Some(json) = &self.lifecycle_bundles {
            let bundles = LifecycleBundles::from_json(json)
                .map_err(|e| format!("--lifecycle-bundles: {e}"))?;
            cfg.lifecycle.bundles = bundles
                .iter()
                .map(|(stack, bundle)| (stack.to_string(), bundle.to_string()))
                .collect();
        }
        if let Some(level) = &self.log_level {
            cfg.logging.level = level.clone();
        }
        Ok(())
    }
}

pub mod loader {
    use super::{AppConfig, ConfigOverrides};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "bulksync.toml";

    pub fn load_config(path: Option<&str>, overrides: &ConfigOverrides) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if path.is_some() {
            return Err(format!("config file not found: {}", pathbuf.display()));
        }
        // Environment variable overrides, e.g., BULKSYNC__REGISTRY__BATCH_SIZE=100
        builder = builder.add_source(
            Environment::with_prefix("BULKSYNC")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("store.cluster"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let mut merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        overrides.apply(&mut merged)?;
        merged.validate()?;
        Ok(merged)
    }
}
