use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("process guid must not be empty")]
    Empty,

    #[error("process guid contains a path separator: {0}")]
    PathSeparator(String),
}

/// Stable identifier of an application process, used as the store key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessGuid(String);

impl ProcessGuid {
    pub fn new(guid: impl Into<String>) -> Self {
        Self(guid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that the guid can be used as a single store key segment.
    pub fn validate(&self) -> Result<(), IdError> {
        if self.0.trim().is_empty() {
            return Err(IdError::Empty);
        }
        if self.0.contains('/') {
            return Err(IdError::PathSeparator(self.0.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for ProcessGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProcessGuid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProcessGuid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ProcessGuid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(ProcessGuid::new("app-1").validate().is_ok());
        assert_eq!(ProcessGuid::new("  ").validate(), Err(IdError::Empty));
        assert!(matches!(
            ProcessGuid::new("a/b").validate(),
            Err(IdError::PathSeparator(_))
        ));
    }

    #[test]
    fn test_serde_is_transparent() {
        let guid = ProcessGuid::new("abc");
        assert_eq!(serde_json::to_string(&guid).unwrap(), "\"abc\"");
        let back: ProcessGuid = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, guid);
    }
}
