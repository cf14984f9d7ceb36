use std::collections::HashMap;

use super::RecipeError;
use crate::storage::StorageRef;

/// Named storages registered with one recipe.
///
/// Names are the only identity; registering two storages under one name
/// is a configuration fault even when they point at the same root.
#[derive(Debug, Clone, Default)]
pub struct StorageRegistry {
    storages: HashMap<String, StorageRef>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, storage: StorageRef) -> Result<(), RecipeError> {
        if self.storages.contains_key(&storage.name) {
            return Err(RecipeError::duplicate_storage(&storage.name));
        }
        self.storages.insert(storage.name.clone(), storage);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&StorageRef> {
        self.storages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.storages.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.storages.len()
    }

    /// Registered names, sorted for stable logging.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.storages.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let mut registry = StorageRegistry::new();
        registry
            .register(StorageRef::new("seq1", "/mnt/seq1"))
            .unwrap();

        assert!(registry.contains("seq1"));
        assert_eq!(registry.get("seq1").unwrap().root().to_str(), Some("/mnt/seq1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = StorageRegistry::new();
        registry
            .register(StorageRef::new("seq1", "/mnt/seq1"))
            .unwrap();

        let err = registry
            .register(StorageRef::new("seq1", "/mnt/other"))
            .unwrap_err();
        assert!(matches!(err, RecipeError::DuplicateStorage { name } if name == "seq1"));
        // The original registration is untouched.
        assert_eq!(registry.get("seq1").unwrap().root().to_str(), Some("/mnt/seq1"));
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = StorageRegistry::new();
        registry.register(StorageRef::new("work", "/work")).unwrap();
        registry.register(StorageRef::new("bcl", "/bcl")).unwrap();

        assert_eq!(registry.names(), vec!["bcl".to_string(), "work".to_string()]);
    }
}
