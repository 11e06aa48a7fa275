use bulksync_storage::{DynStore, StoreError};
use futures_util::StreamExt;
use futures_util::stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::actions::{ActionKind, SyncAction};
use super::cycle::CycleReport;
use super::error::CycleAbort;

/// Applies actions to the store with bounded concurrency.
///
/// Actions are independent, so they run in any order. Failed actions are not
/// retried; the next cycle sees the same discrepancy again.
#[derive(Clone)]
pub struct Applier {
    store: DynStore,
    max_concurrent_writes: usize,
}

impl Applier {
    pub fn new(store: DynStore, max_concurrent_writes: usize) -> Self {
        Self {
            store,
            max_concurrent_writes: max_concurrent_writes.max(1),
        }
    }

    /// Applies actions and records the outcomes in `report`.
    ///
    /// Once `cancel` fires no further write is started; writes already in
    /// flight finish and are recorded. Returns `Cancelled` if any action was
    /// left unstarted.
    pub async fn apply(
        &self,
        actions: Vec<SyncAction>,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) -> Result<(), CycleAbort> {
        let total = actions.len();
        let results: Vec<_> = stream::iter(actions)
            .take_until(cancel.cancelled())
            .map(|action| async move {
                let result = self.apply_one(&action).await;
                (action, result)
            })
            .buffer_unordered(self.max_concurrent_writes)
            .collect()
            .await;

        let started = results.len();
        for (action, result) in results {
            let kind = action.kind();
            let process_guid = action.process_guid();
            match result {
                Ok(()) => {
                    debug!(process_guid = %process_guid, action = %kind, "applied");
                    report.record_applied(kind);
                }
                Err(e) if e.is_conflict() => {
                    info!(
                        process_guid = %process_guid,
                        action = %kind,
                        error = %e,
                        "store record already converged elsewhere"
                    );
                    report.conflicts += 1;
                }
                Err(e) => {
                    warn!(
                        process_guid = %process_guid,
                        action = %kind,
                        category = %e.category(),
                        error = %e,
                        "store write failed"
                    );
                    report.failed += 1;
                }
            }
        }

        if started < total {
            info!(started, skipped = total - started, "stopped applying on cancellation");
            return Err(CycleAbort::Cancelled);
        }
        Ok(())
    }

    async fn apply_one(&self, action: &SyncAction) -> Result<(), StoreError> {
        match action {
            SyncAction::Create { recipe } => self.store.upsert(recipe, None).await.map(drop),
            SyncAction::Update { recipe, version } => {
                self.store.upsert(recipe, Some(*version)).await.map(drop)
            }
            SyncAction::Delete {
                process_guid,
                version,
            } => self.store.delete(process_guid, Some(*version)).await,
        }
    }
}

impl CycleReport {
    fn record_applied(&mut self, kind: ActionKind) {
        match kind {
            ActionKind::Create => self.created += 1,
            ActionKind::Update => self.updated += 1,
            ActionKind::Delete => self.deleted += 1,
        }
    }
}
