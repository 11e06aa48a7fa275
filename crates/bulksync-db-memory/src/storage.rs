use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bulksync_core::{ProcessGuid, Recipe};
use bulksync_storage::{DesiredStateRecord, DesiredStateStore, StoreError, StoreVersion};
use tokio::sync::{Mutex, RwLock};

/// In-memory desired-state store with the same compare-and-set semantics as
/// the etcd backend.
///
/// Versions come from a single counter shared by all keys, mirroring etcd's
/// global modification index.
#[derive(Debug)]
pub struct InMemoryStore {
    records: RwLock<BTreeMap<ProcessGuid, DesiredStateRecord>>,
    index: AtomicU64,
    /// Guids whose next write fails with `Unavailable`
    failing: Mutex<HashSet<ProcessGuid>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            index: AtomicU64::new(1),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Creates a store pre-populated with recipes, bypassing preconditions.
    pub fn with_recipes(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        let mut store = Self::new();
        {
            let records = store.records.get_mut();
            for recipe in recipes {
                let version = StoreVersion(store.index.fetch_add(1, Ordering::SeqCst));
                records.insert(
                    recipe.process_guid.clone(),
                    DesiredStateRecord::new(recipe, version),
                );
            }
        }
        store
    }

    /// Makes the next write (upsert or delete) to `guid` fail as unavailable.
    pub async fn inject_write_failure(&self, guid: impl Into<ProcessGuid>) {
        self.failing.lock().await.insert(guid.into());
    }

    pub async fn get(&self, guid: &ProcessGuid) -> Option<DesiredStateRecord> {
        self.records.read().await.get(guid).cloned()
    }

    pub async fn guids(&self) -> Vec<ProcessGuid> {
        self.records.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn next_version(&self) -> StoreVersion {
        StoreVersion(self.index.fetch_add(1, Ordering::SeqCst))
    }

    async fn take_injected_failure(&self, guid: &ProcessGuid) -> Result<(), StoreError> {
        if self.failing.lock().await.remove(guid) {
            return Err(StoreError::unavailable(format!(
                "injected write failure for {guid}"
            )));
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DesiredStateStore for InMemoryStore {
    async fn list(&self) -> Result<Vec<DesiredStateRecord>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn upsert(
        &self,
        recipe: &Recipe,
        expected: Option<StoreVersion>,
    ) -> Result<StoreVersion, StoreError> {
        let guid = &recipe.process_guid;
        self.take_injected_failure(guid).await?;

        let mut records = self.records.write().await;
        match (records.get(guid), expected) {
            (Some(_), None) => return Err(StoreError::already_exists(guid.as_str())),
            (None, Some(version)) => {
                return Err(StoreError::version_conflict(guid.as_str(), version));
            }
            (Some(current), Some(version)) if current.version != version => {
                return Err(StoreError::version_conflict(guid.as_str(), version));
            }
            _ => {}
        }

        let version = self.next_version();
        records.insert(guid.clone(), DesiredStateRecord::new(recipe.clone(), version));
        Ok(version)
    }

    async fn delete(
        &self,
        process_guid: &ProcessGuid,
        expected: Option<StoreVersion>,
    ) -> Result<(), StoreError> {
        self.take_injected_failure(process_guid).await?;

        let mut records = self.records.write().await;
        let Some(current) = records.get(process_guid) else {
            return Ok(());
        };
        if let Some(version) = expected
            && current.version != version
        {
            return Err(StoreError::version_conflict(process_guid.as_str(), version));
        }
        records.remove(process_guid);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
