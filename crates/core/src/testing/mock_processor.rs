//! Mock processor for testing.

use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::processor::{ProcessOutcome, ProcessorError, RunProcessor};
use crate::run::{RunHandle, RunId};
use crate::runconfig::RunConfiguration;
use crate::storage::StorageRef;

/// A recorded processor invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedProcess {
    /// Run that was handed in.
    pub run_id: RunId,
    /// Merged configuration the step passed along.
    pub conf: RunConfiguration,
    /// Name of the output storage.
    pub output_storage: String,
}

/// Mock implementation of the RunProcessor trait.
///
/// Provides controllable behavior for testing:
/// - Record every invocation with its merged configuration
/// - Inject a one-shot error
/// - Fail the first N invocations, then succeed (retry scenarios)
///
/// Cloning shares state.
#[derive(Clone)]
pub struct MockProcessor {
    name: String,
    calls: Arc<RwLock<Vec<RecordedProcess>>>,
    next_error: Arc<RwLock<Option<ProcessorError>>>,
    fail_remaining: Arc<RwLock<u32>>,
}

impl Default for MockProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessor {
    pub const NAME: &'static str = "mock";

    pub fn new() -> Self {
        Self {
            name: Self::NAME.to_string(),
            calls: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            fail_remaining: Arc::new(RwLock::new(0)),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get all recorded invocations.
    pub async fn recorded(&self) -> Vec<RecordedProcess> {
        self.calls.read().await.clone()
    }

    /// Get the number of invocations.
    pub async fn process_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Configure the next invocation to fail with the given error.
    pub async fn set_next_error(&self, error: ProcessorError) {
        *self.next_error.write().await = Some(error);
    }

    /// Fail the next `n` invocations with an injected io error.
    pub async fn fail_times(&self, n: u32) {
        *self.fail_remaining.write().await = n;
    }
}

#[async_trait]
impl RunProcessor for MockProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(
        &self,
        run: &RunHandle,
        conf: &RunConfiguration,
        output: &StorageRef,
    ) -> Result<ProcessOutcome, ProcessorError> {
        self.calls.write().await.push(RecordedProcess {
            run_id: run.run_id.clone(),
            conf: conf.clone(),
            output_storage: output.name.clone(),
        });

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let mut remaining = self.fail_remaining.write().await;
        if *remaining > 0 {
            *remaining -= 1;
            return Err(ProcessorError::io(
                &run.run_id,
                io::Error::other("injected failure"),
            ));
        }

        Ok(ProcessOutcome::at(output.entry_path(run.run_id.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn storage() -> StorageRef {
        StorageRef::new("out", "/data/out")
    }

    #[tokio::test]
    async fn test_records_calls_and_succeeds() {
        let storage = storage();
        let processor = MockProcessor::new();
        let run = fixtures::handle(&storage, fixtures::RUN_A);
        let conf = RunConfiguration::new();

        let outcome = processor.process(&run, &conf, &storage).await.unwrap();

        assert_eq!(
            outcome.output,
            Some(storage.entry_path(fixtures::RUN_A))
        );
        let recorded = processor.recorded().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].run_id, run.run_id);
        assert_eq!(recorded[0].output_storage, "out");
    }

    #[tokio::test]
    async fn test_fail_times_then_succeed() {
        let storage = storage();
        let processor = MockProcessor::new();
        processor.fail_times(2).await;
        let run = fixtures::handle(&storage, fixtures::RUN_A);
        let conf = RunConfiguration::new();

        assert!(processor.process(&run, &conf, &storage).await.is_err());
        assert!(processor.process(&run, &conf, &storage).await.is_err());
        assert!(processor.process(&run, &conf, &storage).await.is_ok());
        assert_eq!(processor.process_count().await, 3);
    }
}
