use super::{ProcessorError, RunProcessor};
use std::collections::HashMap;
use std::sync::Arc;

/// Name-indexed set of processors available to recipe steps.
///
/// Unlike discovery providers, processors are registered as ready
/// instances rather than factories, and a name collision is an error:
/// two steps asking for "rsync" must get the same processor, so a
/// silent overwrite would hide a wiring mistake.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn RunProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in processors registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let rsync = super::RsyncProcessor::new();
        registry
            .register(Arc::new(rsync))
            .unwrap_or_else(|_| unreachable!("empty registry cannot collide"));
        registry
    }

    pub fn register(&mut self, processor: Arc<dyn RunProcessor>) -> Result<(), ProcessorError> {
        let name = processor.name().to_string();
        if self.processors.contains_key(&name) {
            return Err(ProcessorError::duplicate_name(name));
        }
        self.processors.insert(name, processor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RunProcessor>> {
        self.processors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    /// Registered processor names, sorted for stable logging.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.processors.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{ProcessOutcome, RunProcessor};
    use crate::run::RunHandle;
    use crate::runconfig::RunConfiguration;
    use crate::storage::StorageRef;
    use async_trait::async_trait;

    struct FakeProcessor {
        name: String,
    }

    #[async_trait]
    impl RunProcessor for FakeProcessor {
        fn name(&self) -> &str {
            &self.name
        }

        async fn process(
            &self,
            _run: &RunHandle,
            _conf: &RunConfiguration,
            _output: &StorageRef,
        ) -> Result<ProcessOutcome, ProcessorError> {
            Ok(ProcessOutcome::default())
        }
    }

    fn fake(name: &str) -> Arc<dyn RunProcessor> {
        Arc::new(FakeProcessor {
            name: name.to_string(),
        })
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ProcessorRegistry::new();
        registry.register(fake("copy")).unwrap();

        assert!(registry.contains("copy"));
        let processor = registry.get("copy").unwrap();
        assert_eq!(processor.name(), "copy");
    }

    #[test]
    fn test_duplicate_registration_is_an_error() {
        let mut registry = ProcessorRegistry::new();
        registry.register(fake("copy")).unwrap();

        let err = registry.register(fake("copy")).unwrap_err();
        assert!(matches!(err, ProcessorError::DuplicateName { name } if name == "copy"));
    }

    #[test]
    fn test_unknown_name_returns_none() {
        let registry = ProcessorRegistry::new();
        assert!(registry.get("missing").is_none());
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn test_defaults_include_rsync() {
        let registry = ProcessorRegistry::with_defaults();
        assert!(registry.contains("rsync"));
        assert_eq!(registry.names(), vec!["rsync".to_string()]);
    }
}
