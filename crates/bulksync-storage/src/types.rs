//! Record types shared by all desired-state store backends.

use std::fmt;

use bulksync_core::{ProcessGuid, Recipe};
use serde::{Deserialize, Serialize};

/// Store-assigned modification index of a record, used for compare-and-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreVersion(pub u64);

impl fmt::Display for StoreVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The platform's recorded intent for one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredStateRecord {
    /// The recipe the execution layer should converge to.
    pub recipe: Recipe,
    /// Version observed when the record was read.
    pub version: StoreVersion,
}

impl DesiredStateRecord {
    #[must_use]
    pub fn new(recipe: Recipe, version: StoreVersion) -> Self {
        Self { recipe, version }
    }

    pub fn process_guid(&self) -> &ProcessGuid {
        &self.recipe.process_guid
    }

    pub fn instances(&self) -> u32 {
        self.recipe.instances
    }
}
