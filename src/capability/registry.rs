//! Name → capability table.
//!
//! Capabilities are registered once, before any configuration is loaded, and
//! looked up by the expression compiler. [`Registry::global`] is the
//! process-wide instance; tests and embedders can also build private
//! registries with [`Registry::new`].

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, OnceLock};
use strsim::levenshtein;
use tracing::debug;

use super::{CROSS_REFERENCE, Capability};
use crate::core::{FeatureError, Result};

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Maximum edit distance for "did you mean" suggestions.
const SUGGESTION_DISTANCE: usize = 2;

/// Capability lookup table.
#[derive(Debug, Default)]
pub struct Registry {
    table: DashMap<String, Arc<dyn Capability>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Register `capability` under its name.
    ///
    /// Fails if the name is already taken or is the reserved cross-reference name.
    pub fn register(&self, capability: Arc<dyn Capability>) -> Result<()> {
        let name = capability.name().to_string();
        if name == CROSS_REFERENCE {
            return Err(FeatureError::ReservedCapability {
                name,
            });
        }

        match self.table.entry(name) {
            Entry::Occupied(entry) => Err(FeatureError::DuplicateCapability {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                debug!("Registered capability '{}'", entry.key());
                entry.insert(capability);
                Ok(())
            }
        }
    }

    /// Find the capability registered as `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.table.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Closest registered name to `name`, if one is near enough to be a typo.
    #[must_use]
    pub fn suggest(&self, name: &str) -> Option<String> {
        closest(name, self.names().iter().map(String::as_str))
    }
}

/// Closest candidate to `name` within the suggestion distance.
pub(crate) fn closest<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    candidates
        .map(|candidate| (levenshtein(name, candidate), candidate))
        .filter(|(distance, _)| *distance <= SUGGESTION_DISTANCE)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::expr::CapabilitySpec;
    use crate::feature::{Feature, ValueType};

    #[derive(Debug)]
    struct Named(&'static str);

    impl Capability for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn result_type(&self) -> ValueType {
            ValueType::String
        }

        fn extract(&self, _ctx: &RequestContext, _spec: &CapabilitySpec) -> Option<Feature> {
            Some(Feature::from(self.0))
        }
    }

    #[test]
    fn test_register_and_find() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(Named("method"))).unwrap();

        assert!(registry.contains("method"));
        assert_eq!(registry.find("method").unwrap().name(), "method");
        assert!(registry.find("path").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = Registry::new();
        registry.register(Arc::new(Named("method"))).unwrap();
        let err = registry.register(Arc::new(Named("method"))).unwrap_err();
        assert!(matches!(err, FeatureError::DuplicateCapability { ref name } if name == "method"));
    }

    #[test]
    fn test_cross_reference_name_reserved() {
        let registry = Registry::new();
        let err = registry.register(Arc::new(Named("this"))).unwrap_err();
        assert!(matches!(err, FeatureError::ReservedCapability { .. }));
    }

    #[test]
    fn test_suggest() {
        let registry = Registry::new();
        registry.register(Arc::new(Named("method"))).unwrap();
        registry.register(Arc::new(Named("path"))).unwrap();

        assert_eq!(registry.suggest("metod"), Some("method".to_string()));
        assert_eq!(registry.suggest("completely-different"), None);
        assert_eq!(registry.names(), vec!["method".to_string(), "path".to_string()]);
    }
}
