//! Provider registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::{IlluminaProcessedDiscovery, IlluminaRawDiscovery, NoopDiscovery, RunDiscovery};
use crate::storage::StorageRef;

type DiscoveryFactory = Box<dyn Fn(StorageRef) -> Arc<dyn RunDiscovery> + Send + Sync>;

/// Explicit name → factory map for discovery providers.
///
/// Built once at startup and injected into recipe assembly; there is no
/// ambient global lookup. A later registration under the same name
/// replaces the earlier one.
pub struct DiscoveryRegistry {
    factories: HashMap<String, DiscoveryFactory>,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in providers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(IlluminaRawDiscovery::NAME, |storage| {
            Arc::new(IlluminaRawDiscovery::new(storage))
        });
        registry.register(IlluminaProcessedDiscovery::NAME, |storage| {
            Arc::new(IlluminaProcessedDiscovery::new(storage))
        });
        registry.register(NoopDiscovery::NAME, |storage| {
            Arc::new(NoopDiscovery::new(storage))
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(StorageRef) -> Arc<dyn RunDiscovery> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Instantiates the named provider bound to `storage`; `None` for an
    /// unknown name.
    pub fn create(&self, name: &str, storage: StorageRef) -> Option<Arc<dyn RunDiscovery>> {
        self.factories.get(name).map(|factory| factory(storage))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for DiscoveryRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_builtin_providers() {
        let registry = DiscoveryRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["illumina_bcl", "illumina_fastq", "noop"]
        );
    }

    #[test]
    fn test_create_binds_storage() {
        let registry = DiscoveryRegistry::with_defaults();
        let storage = StorageRef::new("raw", "/data/runs");

        let provider = registry.create("illumina_bcl", storage.clone()).unwrap();
        assert_eq!(provider.name(), "illumina_bcl");
        assert_eq!(provider.storage(), &storage);
    }

    #[test]
    fn test_unknown_name_is_none() {
        let registry = DiscoveryRegistry::with_defaults();
        assert!(registry
            .create("nanopore", StorageRef::new("x", "/x"))
            .is_none());
        assert!(!registry.contains("nanopore"));
    }

    #[test]
    fn test_later_registration_replaces() {
        let mut registry = DiscoveryRegistry::with_defaults();
        registry.register("illumina_bcl", |storage| {
            Arc::new(NoopDiscovery::new(storage))
        });

        let provider = registry
            .create("illumina_bcl", StorageRef::new("raw", "/data"))
            .unwrap();
        assert!(!provider.can_provide());
    }
}
