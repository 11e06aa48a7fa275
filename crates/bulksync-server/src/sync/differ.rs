//! Comparison of registry records against the store snapshot.
//!
//! A [`CycleDiff`] lives for one cycle. Create and update actions come out of
//! [`CycleDiff::observe`] page by page; deletes only come out of
//! [`CycleDiff::finish`], which takes the diff by value so an aborted cycle
//! cannot reach it.

use std::collections::{BTreeMap, HashMap};

use bulksync_core::{ApplicationRecord, ProcessGuid, Recipe, RecipeBuilder};
use bulksync_registry::{FetchBatch, FetchError};
use bulksync_storage::DesiredStateRecord;
use tracing::{debug, warn};

use super::actions::SyncAction;
use super::error::CycleAbort;

/// Actions and counters produced by one page.
#[derive(Debug, Default)]
pub struct BatchDiff {
    pub actions: Vec<SyncAction>,
    pub unchanged: usize,
    pub skipped: usize,
}

pub struct CycleDiff<'a> {
    builder: &'a RecipeBuilder,
    existing: BTreeMap<ProcessGuid, DesiredStateRecord>,
    /// Every guid seen this cycle; `None` when its record was skipped.
    observed: HashMap<ProcessGuid, Option<Recipe>>,
}

impl<'a> CycleDiff<'a> {
    pub fn new(builder: &'a RecipeBuilder, snapshot: Vec<DesiredStateRecord>) -> Self {
        let existing = snapshot
            .into_iter()
            .map(|record| (record.process_guid().clone(), record))
            .collect();
        Self {
            builder,
            existing,
            observed: HashMap::new(),
        }
    }

    /// Number of distinct guids seen so far.
    pub fn observed(&self) -> usize {
        self.observed.len()
    }

    /// Diffs one page of records.
    ///
    /// Records whose recipe cannot be built are skipped but still count as
    /// observed. A guid seen again with different contents aborts the cycle.
    pub fn observe(&mut self, records: &[ApplicationRecord]) -> Result<BatchDiff, CycleAbort> {
        let mut diff = BatchDiff::default();

        for record in records {
            let built = match self.builder.build(record) {
                Ok(recipe) => Some(recipe),
                Err(e) => {
                    warn!(
                        process_guid = %record.process_guid,
                        stack = %record.stack,
                        error = %e,
                        "skipping application record"
                    );
                    None
                }
            };

            if let Some(previous) = self.observed.get(&record.process_guid) {
                if *previous == built {
                    debug!(process_guid = %record.process_guid, "duplicate registry record ignored");
                    continue;
                }
                return Err(CycleAbort::InconsistentListing {
                    process_guid: record.process_guid.clone(),
                });
            }

            if let Some(recipe) = &built {
                match self.existing.get(&record.process_guid) {
                    None => diff.actions.push(SyncAction::Create {
                        recipe: recipe.clone(),
                    }),
                    Some(current) if current.recipe == *recipe => diff.unchanged += 1,
                    Some(current) => diff.actions.push(SyncAction::Update {
                        recipe: recipe.clone(),
                        version: current.version,
                    }),
                }
            } else {
                diff.skipped += 1;
            }

            self.observed.insert(record.process_guid.clone(), built);
        }

        Ok(diff)
    }

    /// Deletes for every stored guid the completed listing did not mention.
    pub fn finish(self) -> Vec<SyncAction> {
        self.existing
            .into_iter()
            .filter(|(guid, _)| !self.observed.contains_key(guid))
            .map(|(process_guid, record)| SyncAction::Delete {
                process_guid,
                version: record.version,
            })
            .collect()
    }
}

/// Outcome of diffing a whole listing in one go.
#[derive(Debug)]
pub struct Reconciliation {
    pub actions: Vec<SyncAction>,
    /// Set when the listing did not complete; `actions` then holds no deletes.
    pub abort: Option<CycleAbort>,
}

/// Diffs a full sequence of pages against a snapshot without touching a store.
///
/// The sequence counts as complete only if its last page carries the
/// end-of-listing marker.
pub fn reconcile<I>(
    batches: I,
    snapshot: Vec<DesiredStateRecord>,
    builder: &RecipeBuilder,
) -> Reconciliation
where
    I: IntoIterator<Item = Result<FetchBatch, FetchError>>,
{
    let mut diff = CycleDiff::new(builder, snapshot);
    let mut actions = Vec::new();
    let mut complete = false;

    for batch in batches {
        let observed = batch
            .map_err(CycleAbort::from)
            .and_then(|batch| {
                complete = batch.is_final();
                diff.observe(&batch.records)
            });
        match observed {
            Ok(page) => actions.extend(page.actions),
            Err(abort) => {
                return Reconciliation {
                    actions,
                    abort: Some(abort),
                };
            }
        }
    }

    if !complete {
        return Reconciliation {
            actions,
            abort: Some(CycleAbort::IncompleteListing),
        };
    }

    actions.extend(diff.finish());
    Reconciliation {
        actions,
        abort: None,
    }
}
