use serde::Serialize;
use std::path::PathBuf;

use crate::run::RunId;

/// Wiring mistakes caught while building a recipe.
///
/// These are configuration faults, so every one of them is fatal at
/// startup rather than retried.
#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error("storage {name} is already registered")]
    DuplicateStorage { name: String },

    #[error("step {name} is already registered")]
    DuplicateStep { name: String },

    #[error("unknown storage {name}")]
    UnknownStorage { name: String },

    #[error("unknown discovery provider {name}")]
    UnknownProvider { name: String },

    #[error("unknown processor {name}")]
    UnknownProcessor { name: String },

    #[error("unknown run configuration resolver {name}")]
    UnknownResolver { name: String },

    #[error("step {step} uses the sample sheet resolver but configures no sample sheet")]
    MissingSampleSheet { step: String },

    #[error("step {step} output storage {storage} expands to multiple roots")]
    MultiRootOutput { step: String, storage: String },

    #[error("provider {provider} cannot serve storage {storage}")]
    ProviderUnavailable { provider: String, storage: String },

    #[error("recipe {name} has no steps")]
    NoSteps { name: String },
}

impl RecipeError {
    pub fn duplicate_storage(name: impl Into<String>) -> Self {
        Self::DuplicateStorage { name: name.into() }
    }

    pub fn duplicate_step(name: impl Into<String>) -> Self {
        Self::DuplicateStep { name: name.into() }
    }

    pub fn unknown_storage(name: impl Into<String>) -> Self {
        Self::UnknownStorage { name: name.into() }
    }

    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Self::UnknownProvider { name: name.into() }
    }

    pub fn unknown_processor(name: impl Into<String>) -> Self {
        Self::UnknownProcessor { name: name.into() }
    }

    pub fn unknown_resolver(name: impl Into<String>) -> Self {
        Self::UnknownResolver { name: name.into() }
    }

    pub fn missing_sample_sheet(step: impl Into<String>) -> Self {
        Self::MissingSampleSheet { step: step.into() }
    }
}

/// Why a step left a run untouched this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The run id turned up in the ledger after the claim was taken.
    AlreadyRecorded,
    /// Another instance holds the per-run claim marker.
    ClaimHeld,
}

/// What happened to one run in one step during one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunDisposition {
    Processed { output: Option<PathBuf> },
    Skipped { reason: SkipReason },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub disposition: RunDisposition,
}

/// Per-step slice of a cycle. Runs already in the step's ledger at the
/// start of the cycle are filtered out before reporting, so steady-state
/// cycles produce empty reports.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: String,
    pub runs: Vec<RunReport>,
}

impl StepReport {
    pub fn processed(&self) -> usize {
        self.count(|d| matches!(d, RunDisposition::Processed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|d| matches!(d, RunDisposition::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|d| matches!(d, RunDisposition::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&RunDisposition) -> bool) -> usize {
        self.runs.iter().filter(|r| pred(&r.disposition)).count()
    }
}

/// A storage that could not be listed this cycle.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryFailure {
    pub provider: String,
    pub storage: String,
    pub error: String,
}

/// Everything one recipe did in one poll cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub recipe: String,
    /// Candidate runs after cross-storage deduplication.
    pub discovered: usize,
    pub unavailable: Vec<DiscoveryFailure>,
    pub steps: Vec<StepReport>,
}

impl CycleReport {
    pub fn processed(&self) -> usize {
        self.steps.iter().map(StepReport::processed).sum()
    }

    pub fn failed(&self) -> usize {
        self.steps.iter().map(StepReport::failed).sum()
    }
}
