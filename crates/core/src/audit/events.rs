use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
///
/// The journal records state changes, not steady-state observations:
/// a run that is merely seen again on a later cycle produces nothing,
/// while a claim, a step result, or a ledger append always does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // Daemon lifecycle
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Polling cycles
    CycleStarted {
        cycle_id: String,
    },
    CycleCompleted {
        cycle_id: String,
        /// Runs that went through at least one step this cycle.
        runs_processed: usize,
        runs_failed: usize,
        duration_ms: u64,
    },
    /// The cycle did not start, e.g. the execution lock is held elsewhere.
    CycleSkipped {
        cycle_id: String,
        reason: String,
    },
    StaleLockReaped {
        lock_path: String,
    },

    // Discovery
    /// A storage root could not be listed; its runs are invisible this
    /// cycle but nothing is recorded as done.
    DiscoveryUnavailable {
        recipe: String,
        provider: String,
        storage: String,
        error: String,
    },

    // Step execution
    RunClaimed {
        recipe: String,
        step: String,
        run_id: String,
    },
    StepCompleted {
        recipe: String,
        step: String,
        run_id: String,
        /// Where the output landed, when the processor produced any.
        output: Option<String>,
        duration_ms: u64,
    },
    StepFailed {
        recipe: String,
        step: String,
        run_id: String,
        error: String,
    },
    ConfigResolutionFailed {
        recipe: String,
        step: String,
        run_id: String,
        resolver: String,
        error: String,
    },
    /// The run id was appended to the step's ledger; from now on every
    /// classification of this run is a no-op for the step.
    RunRecorded {
        recipe: String,
        step: String,
        run_id: String,
        output_run_id: String,
    },
}

impl AuditEvent {
    /// Stable string identifier for the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::CycleStarted { .. } => "cycle_started",
            Self::CycleCompleted { .. } => "cycle_completed",
            Self::CycleSkipped { .. } => "cycle_skipped",
            Self::StaleLockReaped { .. } => "stale_lock_reaped",
            Self::DiscoveryUnavailable { .. } => "discovery_unavailable",
            Self::RunClaimed { .. } => "run_claimed",
            Self::StepCompleted { .. } => "step_completed",
            Self::StepFailed { .. } => "step_failed",
            Self::ConfigResolutionFailed { .. } => "config_resolution_failed",
            Self::RunRecorded { .. } => "run_recorded",
        }
    }

    /// Extract run_id if this event is tied to one run
    pub fn run_id(&self) -> Option<&str> {
        match self {
            Self::RunClaimed { run_id, .. }
            | Self::StepCompleted { run_id, .. }
            | Self::StepFailed { run_id, .. }
            | Self::ConfigResolutionFailed { run_id, .. }
            | Self::RunRecorded { run_id, .. } => Some(run_id),
            _ => None,
        }
    }

    /// Extract recipe name if this event happened inside a recipe
    pub fn recipe(&self) -> Option<&str> {
        match self {
            Self::DiscoveryUnavailable { recipe, .. }
            | Self::RunClaimed { recipe, .. }
            | Self::StepCompleted { recipe, .. }
            | Self::StepFailed { recipe, .. }
            | Self::ConfigResolutionFailed { recipe, .. }
            | Self::RunRecorded { recipe, .. } => Some(recipe),
            _ => None,
        }
    }
}

/// A stored audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub run_id: Option<String>,
    pub recipe: Option<String>,
    pub data: AuditEvent,
}
