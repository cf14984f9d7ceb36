//! Resolver error types.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::run::RunId;

/// Failure to resolve the configuration of one run.
///
/// Resolver errors fail that run for the cycle, never the cycle itself;
/// the run stays out of the ledger and is retried on a later poll.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("no run configuration found for run {run_id}: {detail}")]
    NotFound { run_id: RunId, detail: String },

    #[error("cannot read run configuration source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("run id {run_id} unusable for resolution: {detail}")]
    InvalidRunId { run_id: RunId, detail: String },
}

impl ResolverError {
    pub fn not_found(run_id: &RunId, detail: impl Into<String>) -> Self {
        Self::NotFound {
            run_id: run_id.clone(),
            detail: detail.into(),
        }
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn invalid_run_id(run_id: &RunId, detail: impl Into<String>) -> Self {
        Self::InvalidRunId {
            run_id: run_id.clone(),
            detail: detail.into(),
        }
    }
}
