//! Wiring of configured components into a cycle runner.

use std::sync::Arc;

use bulksync_core::RecipeBuilder;
use bulksync_db_etcd::EtcdStore;
use bulksync_registry::{CcBulkFetcher, DynFetcher};
use bulksync_storage::DynStore;
use tracing::info;

use crate::config::AppConfig;
use crate::error::StartupError;
use crate::sync::{CycleRunner, SyncScheduler};

/// Builds the recipe builder from the configured bundles and health address.
pub fn recipe_builder(cfg: &AppConfig) -> Result<RecipeBuilder, StartupError> {
    let bundles = cfg.lifecycle_bundles()?;
    info!(
        stacks = ?bundles.stacks().collect::<Vec<_>>(),
        "lifecycle bundles loaded"
    );
    Ok(RecipeBuilder::new(cfg.health.callback_addr.clone(), bundles))
}

/// Connects to the etcd cluster; an unreachable cluster is fatal.
pub async fn connect_store(cfg: &AppConfig) -> Result<DynStore, StartupError> {
    let etcd = cfg.etcd_config();
    let store = EtcdStore::connect(&etcd).await?;
    info!(cluster = ?etcd.cluster, "connected to desired state store");
    Ok(Arc::new(store))
}

pub fn registry_fetcher(cfg: &AppConfig) -> Result<DynFetcher, StartupError> {
    let fetcher = CcBulkFetcher::new(cfg.registry_config())?;
    info!(
        base_url = %cfg.registry.base_url,
        batch_size = fetcher.batch_size(),
        "registry client ready"
    );
    Ok(Arc::new(fetcher))
}

/// Builds a scheduler over an already connected store and fetcher.
pub fn scheduler(
    cfg: &AppConfig,
    store: DynStore,
    fetcher: DynFetcher,
    builder: RecipeBuilder,
) -> SyncScheduler {
    let runner = CycleRunner::new(
        store,
        fetcher,
        Arc::new(builder),
        cfg.store.max_concurrent_writes,
        cfg.fetch_timeout(),
    );
    SyncScheduler::new(runner, cfg.polling_interval())
}

/// Builds every component from configuration, connecting to the store.
pub async fn build_scheduler(cfg: &AppConfig) -> Result<SyncScheduler, StartupError> {
    let builder = recipe_builder(cfg)?;
    let fetcher = registry_fetcher(cfg)?;
    let store = connect_store(cfg).await?;
    Ok(scheduler(cfg, store, fetcher, builder))
}
