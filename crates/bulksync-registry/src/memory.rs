//! Scripted in-process registry for exercising the sync engine without HTTP.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bulksync_core::ApplicationRecord;
use serde_json::json;

use crate::batch::{BulkToken, FetchBatch};
use crate::error::FetchError;
use crate::fetcher::RegistryFetcher;

#[derive(Debug, Default)]
struct Script {
    pages: Vec<Vec<ApplicationRecord>>,
    failures: HashMap<usize, FetchError>,
}

/// Serves a fixed list of pages, optionally failing or stalling on demand.
///
/// Cursors are `{"page": n}`. Failures stay in place until cleared.
#[derive(Debug, Default)]
pub struct ScriptedRegistry {
    script: Mutex<Script>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedRegistry {
    pub fn new(pages: Vec<Vec<ApplicationRecord>>) -> Self {
        Self {
            script: Mutex::new(Script {
                pages,
                failures: HashMap::new(),
            }),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Makes every fetch of page `index` (0-based) fail with `error`.
    #[must_use]
    pub fn fail_on_page(self, index: usize, error: FetchError) -> Self {
        self.script().failures.insert(index, error);
        self
    }

    /// Sleeps for `delay` before answering each fetch.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replaces the listing served from the next fetch on.
    pub fn set_pages(&self, pages: Vec<Vec<ApplicationRecord>>) {
        self.script().pages = pages;
    }

    pub fn clear_failures(&self) {
        self.script().failures.clear();
    }

    /// Number of fetches issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn page(&self, index: usize) -> Result<FetchBatch, FetchError> {
        let script = self.script();
        if let Some(error) = script.failures.get(&index) {
            return Err(error.clone());
        }

        let records = script.pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < script.pages.len()).then(|| page_token(index + 1));
        Ok(FetchBatch { records, next })
    }
}

#[async_trait]
impl RegistryFetcher for ScriptedRegistry {
    async fn fetch_batch(&self, token: &BulkToken) -> Result<FetchBatch, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let index = token
            .0
            .get("page")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        self.page(index as usize)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn page_token(index: usize) -> BulkToken {
    BulkToken(json!({ "page": index }))
}
