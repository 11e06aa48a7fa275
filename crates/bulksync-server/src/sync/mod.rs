//! The reconciliation engine.
//!
//! A [`SyncScheduler`] ticks on a fixed interval and hands each tick to a
//! [`CycleRunner`], which lists the store, streams registry pages through a
//! [`CycleDiff`] and applies the resulting actions through an [`Applier`].

mod actions;
mod applier;
mod cycle;
mod differ;
mod error;
mod scheduler;

pub use actions::{ActionKind, SyncAction};
pub use applier::Applier;
pub use cycle::{CycleOutcome, CycleReport, CycleRunner};
pub use differ::{BatchDiff, CycleDiff, Reconciliation, reconcile};
pub use error::CycleAbort;
pub use scheduler::{SchedulerHandle, SchedulerState, SchedulerStats, SyncScheduler};
