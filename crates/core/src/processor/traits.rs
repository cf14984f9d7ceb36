use super::ProcessorError;
use crate::run::RunHandle;
use crate::runconfig::RunConfiguration;
use crate::storage::StorageRef;
use async_trait::async_trait;
use std::path::PathBuf;

/// What a processor reports back on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Where the processed data landed, when the processor produced output.
    pub output: Option<PathBuf>,
    /// Free-form summary for logs and the audit journal.
    pub message: Option<String>,
}

impl ProcessOutcome {
    pub fn at(output: impl Into<PathBuf>) -> Self {
        Self {
            output: Some(output.into()),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A named unit of work applied to one run.
///
/// Implementations must be idempotent-friendly: a run whose processing
/// failed is handed back on the next cycle, so partial output from the
/// failed attempt must either be reused or safely replaced. Processors
/// never touch the run ledger; recording success is the step's job.
#[async_trait]
pub trait RunProcessor: Send + Sync {
    /// Stable name used to wire the processor into recipe steps.
    fn name(&self) -> &str;

    /// Process one run, writing any output under the given storage.
    async fn process(
        &self,
        run: &RunHandle,
        conf: &RunConfiguration,
        output: &StorageRef,
    ) -> Result<ProcessOutcome, ProcessorError>;
}
