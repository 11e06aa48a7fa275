use std::collections::BTreeMap;

use crate::error::BundleMappingError;

/// Closed mapping from stack name to lifecycle bundle path on the file server.
///
/// The set of stacks is fixed when the process starts; records naming any
/// other stack fail recipe construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleBundles {
    bundles: BTreeMap<String, String>,
}

impl LifecycleBundles {
    pub fn new(bundles: BTreeMap<String, String>) -> Result<Self, BundleMappingError> {
        if bundles.is_empty() {
            return Err(BundleMappingError::Empty);
        }
        for (stack, bundle) in &bundles {
            if stack.trim().is_empty() {
                return Err(BundleMappingError::EmptyStack);
            }
            if bundle.trim().is_empty() {
                return Err(BundleMappingError::EmptyBundle(stack.clone()));
            }
        }
        Ok(Self { bundles })
    }

    /// Parses a JSON object such as `{"cflinuxfs2": "cflinuxfs2/lifecycle.tgz"}`.
    pub fn from_json(json: &str) -> Result<Self, BundleMappingError> {
        let bundles: BTreeMap<String, String> = serde_json::from_str(json)?;
        Self::new(bundles)
    }

    pub fn bundle_for(&self, stack: &str) -> Option<&str> {
        self.bundles.get(stack).map(String::as_str)
    }

    pub fn stacks(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bundles
            .iter()
            .map(|(stack, bundle)| (stack.as_str(), bundle.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let bundles =
            LifecycleBundles::from_json(r#"{"lucid64": "lucid/lifecycle.tgz"}"#).unwrap();
        assert_eq!(bundles.bundle_for("lucid64"), Some("lucid/lifecycle.tgz"));
        assert_eq!(bundles.bundle_for("trusty64"), None);
        assert_eq!(bundles.stacks().collect::<Vec<_>>(), vec!["lucid64"]);
    }

    #[test]
    fn test_rejects_malformed_mappings() {
        assert!(matches!(
            LifecycleBundles::from_json("not json"),
            Err(BundleMappingError::Json(_))
        ));
        assert!(matches!(
            LifecycleBundles::from_json(r#"{"a": 1}"#),
            Err(BundleMappingError::Json(_))
        ));
        assert!(matches!(
            LifecycleBundles::from_json("{}"),
            Err(BundleMappingError::Empty)
        ));
        assert!(matches!(
            LifecycleBundles::from_json(r#"{"": "x"}"#),
            Err(BundleMappingError::EmptyStack)
        ));
        assert!(matches!(
            LifecycleBundles::from_json(r#"{"a": " "}"#),
            Err(BundleMappingError::EmptyBundle(stack)) if stack == "a"
        ));
    }
}
