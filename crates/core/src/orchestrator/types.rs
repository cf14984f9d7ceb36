//! Types for the cycle orchestrator.

use thiserror::Error;

use crate::lock::LockError;
use crate::recipe::CycleReport;

/// Errors that can occur while driving a cycle.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Execution lock could not be created, checked or removed.
    #[error("execution lock error: {0}")]
    Lock(#[from] LockError),
}

/// What one tick of the poll loop did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Every recipe ran; reports in recipe order.
    Completed(Vec<CycleReport>),
    /// The execution lock was held by a live process.
    Skipped,
}

impl CycleOutcome {
    pub fn processed(&self) -> usize {
        match self {
            Self::Completed(reports) => reports.iter().map(CycleReport::processed).sum(),
            Self::Skipped => 0,
        }
    }

    pub fn failed(&self) -> usize {
        match self {
            Self::Completed(reports) => reports.iter().map(CycleReport::failed).sum(),
            Self::Skipped => 0,
        }
    }

    pub fn was_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}
