use std::fmt;

use bulksync_core::{ProcessGuid, Recipe};
use bulksync_storage::StoreVersion;

/// A corrective write against the desired-state store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// No record exists for the guid.
    Create { recipe: Recipe },
    /// The stored recipe differs from the freshly built one.
    Update { recipe: Recipe, version: StoreVersion },
    /// The guid was absent from a complete listing.
    Delete {
        process_guid: ProcessGuid,
        version: StoreVersion,
    },
}

impl SyncAction {
    pub fn process_guid(&self) -> &ProcessGuid {
        match self {
            Self::Create { recipe } | Self::Update { recipe, .. } => &recipe.process_guid,
            Self::Delete { process_guid, .. } => process_guid,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::Update { .. } => ActionKind::Update,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}
