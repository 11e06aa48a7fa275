//! Periodic driver for reconciliation cycles.
//!
//! At most one cycle runs at a time. A tick that fires while a cycle is still
//! in flight is dropped and counted, never queued.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::cycle::{CycleOutcome, CycleRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Fetching,
    Diffing,
    Applying,
    ShuttingDown,
    Stopped,
}

impl SchedulerState {
    /// Whether a cycle is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Fetching | Self::Diffing | Self::Applying)
    }

    fn is_stopping(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Stopped)
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Diffing => "diffing",
            Self::Applying => "applying",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Publishes a cycle phase unless the scheduler is already stopping.
pub(crate) fn publish(state: &watch::Sender<SchedulerState>, next: SchedulerState) {
    state.send_if_modified(|current| {
        if current.is_stopping() || *current == next {
            return false;
        }
        *current = next;
        true
    });
}

#[derive(Debug, Default)]
struct Counters {
    cycles_started: AtomicU64,
    cycles_completed: AtomicU64,
    cycles_aborted: AtomicU64,
    ticks_dropped: AtomicU64,
}

/// Point-in-time scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub cycles_aborted: u64,
    pub ticks_dropped: u64,
}

pub struct SyncScheduler {
    runner: Arc<CycleRunner>,
    polling_interval: Duration,
}

impl SyncScheduler {
    pub fn new(runner: CycleRunner, polling_interval: Duration) -> Self {
        Self {
            runner: Arc::new(runner),
            polling_interval,
        }
    }

    /// Starts the tick loop in a background task. The first cycle starts
    /// immediately.
    pub fn start(self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let counters = Arc::new(Counters::default());

        let task = tokio::spawn(run_loop(
            self.runner,
            self.polling_interval,
            cancel.clone(),
            Arc::new(state_tx),
            counters.clone(),
        ));

        SchedulerHandle {
            cancel,
            state: state_rx,
            counters,
            task,
        }
    }
}

/// Control surface of a running scheduler.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    state: watch::Receiver<SchedulerState>,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            cycles_started: self.counters.cycles_started.load(Ordering::Relaxed),
            cycles_completed: self.counters.cycles_completed.load(Ordering::Relaxed),
            cycles_aborted: self.counters.cycles_aborted.load(Ordering::Relaxed),
            ticks_dropped: self.counters.ticks_dropped.load(Ordering::Relaxed),
        }
    }

    /// Stops ticking, cancels the in-flight cycle and waits for it to wind
    /// down.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.cancel.cancel();
        self.task.await
    }
}

async fn run_loop(
    runner: Arc<CycleRunner>,
    polling_interval: Duration,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SchedulerState>>,
    counters: Arc<Counters>,
) {
    info!(
        polling_interval_ms = polling_interval.as_millis() as u64,
        "sync scheduler started"
    );

    let mut ticker = interval(polling_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let slot = Arc::new(Semaphore::new(1));
    let mut cycles = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(joined) = cycles.join_next() => log_join(joined),
            _ = ticker.tick() => {
                let Ok(permit) = slot.clone().try_acquire_owned() else {
                    counters.ticks_dropped.fetch_add(1, Ordering::Relaxed);
                    let current = *state.borrow();
                    debug!(state = %current, "cycle still running, tick dropped");
                    continue;
                };

                counters.cycles_started.fetch_add(1, Ordering::Relaxed);
                let runner = runner.clone();
                let cancel = cancel.clone();
                let state = state.clone();
                let counters = counters.clone();
                cycles.spawn(async move {
                    let outcome = runner.run_reporting(&cancel, &state).await;
                    match outcome {
                        CycleOutcome::Completed(_) => {
                            counters.cycles_completed.fetch_add(1, Ordering::Relaxed)
                        }
                        CycleOutcome::Aborted { .. } => {
                            counters.cycles_aborted.fetch_add(1, Ordering::Relaxed)
                        }
                    };
                    publish(&state, SchedulerState::Idle);
                    drop(permit);
                });
            }
        }
    }

    state.send_replace(SchedulerState::ShuttingDown);
    info!(in_flight = cycles.len(), "sync scheduler shutting down");
    while let Some(joined) = cycles.join_next().await {
        log_join(joined);
    }
    state.send_replace(SchedulerState::Stopped);
    info!("sync scheduler stopped");
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "sync cycle task failed");
    }
}
