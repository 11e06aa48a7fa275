use thiserror::Error;

use crate::id::{IdError, ProcessGuid};

/// Per-record failures of the recipe builder.
///
/// None of these abort a reconciliation cycle; the offending record is
/// skipped and the rest of the listing proceeds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecipeError {
    #[error("no lifecycle bundle for stack '{stack}' (process {process_guid})")]
    UnknownStack {
        process_guid: ProcessGuid,
        stack: String,
    },

    #[error("invalid process guid: {0}")]
    InvalidGuid(#[from] IdError),

    #[error("process {0} has no droplet uri")]
    MissingDroplet(ProcessGuid),
}

impl RecipeError {
    pub fn unknown_stack(process_guid: ProcessGuid, stack: impl Into<String>) -> Self {
        Self::UnknownStack {
            process_guid,
            stack: stack.into(),
        }
    }
}

/// Invalid stack to lifecycle bundle mapping. Always fatal at startup.
#[derive(Debug, Error)]
pub enum BundleMappingError {
    #[error("lifecycle bundle mapping is not a JSON object of strings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("lifecycle bundle mapping is empty")]
    Empty,

    #[error("lifecycle bundle mapping contains an empty stack name")]
    EmptyStack,

    #[error("lifecycle bundle for stack '{0}' is empty")]
    EmptyBundle(String),
}
