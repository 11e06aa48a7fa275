//! One poll-fetch-diff-apply pass.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bulksync_core::RecipeBuilder;
use bulksync_registry::{DynFetcher, listing};
use bulksync_storage::DynStore;
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::applier::Applier;
use super::differ::CycleDiff;
use super::error::CycleAbort;
use super::scheduler::{SchedulerState, publish};

/// Counters for one cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub batches: usize,
    pub records: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub skipped: usize,
    /// Writes rejected because another writer got there first
    pub conflicts: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// The full listing was observed and deletes were applied.
    Completed(CycleReport),
    /// The cycle stopped early; no deletes were computed.
    Aborted {
        reason: CycleAbort,
        report: CycleReport,
    },
}

impl CycleOutcome {
    pub fn report(&self) -> &CycleReport {
        match self {
            Self::Completed(report) | Self::Aborted { report, .. } => report,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Runs reconciliation cycles against one registry and one store.
#[derive(Clone)]
pub struct CycleRunner {
    store: DynStore,
    fetcher: DynFetcher,
    builder: Arc<RecipeBuilder>,
    applier: Applier,
    fetch_timeout: Duration,
}

impl CycleRunner {
    pub fn new(
        store: DynStore,
        fetcher: DynFetcher,
        builder: Arc<RecipeBuilder>,
        max_concurrent_writes: usize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            applier: Applier::new(store.clone(), max_concurrent_writes),
            store,
            fetcher,
            builder,
            fetch_timeout,
        }
    }

    /// Runs one cycle.
    pub async fn run(&self, cancel: &CancellationToken) -> CycleOutcome {
        let (phase, _) = watch::channel(SchedulerState::Idle);
        self.run_reporting(cancel, &phase).await
    }

    /// Runs one cycle, publishing its phases on `phase`.
    ///
    /// Cancellation interrupts the store listing and page fetches and stops
    /// new store writes. Writes that have started are allowed to finish.
    pub async fn run_reporting(
        &self,
        cancel: &CancellationToken,
        phase: &watch::Sender<SchedulerState>,
    ) -> CycleOutcome {
        let started = Instant::now();
        let mut report = CycleReport::default();
        let outcome = match self.execute(cancel, phase, &mut report).await {
            Ok(()) => CycleOutcome::Completed(report),
            Err(reason) => CycleOutcome::Aborted { reason, report },
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let report = outcome.report();
        match &outcome {
            CycleOutcome::Completed(_) => info!(
                batches = report.batches,
                records = report.records,
                created = report.created,
                updated = report.updated,
                deleted = report.deleted,
                unchanged = report.unchanged,
                skipped = report.skipped,
                conflicts = report.conflicts,
                failed = report.failed,
                duration_ms,
                "cycle completed"
            ),
            CycleOutcome::Aborted { reason, .. } => warn!(
                reason = %reason,
                kind = reason.kind(),
                batches = report.batches,
                created = report.created,
                updated = report.updated,
                failed = report.failed,
                duration_ms,
                "cycle aborted"
            ),
        }

        outcome
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        phase: &watch::Sender<SchedulerState>,
        report: &mut CycleReport,
    ) -> Result<(), CycleAbort> {
        publish(phase, SchedulerState::Fetching);
        let snapshot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CycleAbort::Cancelled),
            snapshot = self.store.list() => snapshot.map_err(CycleAbort::StoreList)?,
        };

        let mut diff = CycleDiff::new(&self.builder, snapshot);
        let mut pages = listing(&*self.fetcher, self.fetch_timeout);
        let mut complete = false;

        loop {
            publish(phase, SchedulerState::Fetching);
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CycleAbort::Cancelled),
                next = pages.next() => next,
            };
            let Some(page) = next else {
                break;
            };
            let batch = page?;
            complete = batch.is_final();
            report.batches += 1;
            report.records += batch.len();

            publish(phase, SchedulerState::Diffing);
            let page_diff = diff.observe(&batch.records)?;
            report.unchanged += page_diff.unchanged;
            report.skipped += page_diff.skipped;

            if !page_diff.actions.is_empty() {
                publish(phase, SchedulerState::Applying);
                self.applier.apply(page_diff.actions, cancel, report).await?;
            }
        }

        if !complete {
            return Err(CycleAbort::IncompleteListing);
        }
        if cancel.is_cancelled() {
            return Err(CycleAbort::Cancelled);
        }

        publish(phase, SchedulerState::Diffing);
        let deletes = diff.finish();
        if !deletes.is_empty() {
            publish(phase, SchedulerState::Applying);
            self.applier.apply(deletes, cancel, report).await?;
        }

        Ok(())
    }
}
