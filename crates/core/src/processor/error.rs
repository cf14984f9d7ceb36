use crate::run::RunId;
use std::io;
use std::path::PathBuf;

/// Errors surfaced by run processors and the processor registry.
///
/// Every variant carries enough context to log the failure without
/// chasing the run back through the recipe. A failed run stays out of
/// the ledger and is retried on a later cycle, so none of these are
/// terminal for the run itself.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// The run directory disappeared between discovery and processing.
    #[error("input for run {run_id} is missing: {path}")]
    InputMissing { run_id: RunId, path: PathBuf },

    /// The final output directory already exists and was not produced
    /// by an earlier partial pass of this processor.
    #[error("output for run {run_id} already exists: {path}")]
    OutputExists { run_id: RunId, path: PathBuf },

    /// Input and output roots point at the same tree.
    #[error("refusing to process run {run_id} in place: {path}")]
    SameStorage { run_id: RunId, path: PathBuf },

    /// The external binary the processor shells out to is not installed.
    #[error("{tool} not found at {path}")]
    ToolNotFound { tool: String, path: PathBuf },

    /// The external binary ran and exited non-zero.
    #[error("{tool} failed for run {run_id} (exit {code:?}): {stderr}")]
    CommandFailed {
        tool: String,
        run_id: RunId,
        code: Option<i32>,
        stderr: String,
    },

    /// Filesystem failure while staging input or output.
    #[error("io failure while processing run {run_id}: {source}")]
    Io {
        run_id: RunId,
        #[source]
        source: io::Error,
    },

    /// A second processor was registered under an existing name.
    #[error("processor {name} is already registered")]
    DuplicateName { name: String },
}

impl ProcessorError {
    pub fn input_missing(run_id: &RunId, path: impl Into<PathBuf>) -> Self {
        Self::InputMissing {
            run_id: run_id.clone(),
            path: path.into(),
        }
    }

    pub fn output_exists(run_id: &RunId, path: impl Into<PathBuf>) -> Self {
        Self::OutputExists {
            run_id: run_id.clone(),
            path: path.into(),
        }
    }

    pub fn same_storage(run_id: &RunId, path: impl Into<PathBuf>) -> Self {
        Self::SameStorage {
            run_id: run_id.clone(),
            path: path.into(),
        }
    }

    pub fn tool_not_found(tool: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::ToolNotFound {
            tool: tool.into(),
            path: path.into(),
        }
    }

    pub fn io(run_id: &RunId, source: io::Error) -> Self {
        Self::Io {
            run_id: run_id.clone(),
            source,
        }
    }

    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }
}
