//! Cycle orchestrator for periodic run processing.
//!
//! The orchestrator owns the poll loop: every tick it takes the
//! installation-wide execution lock, runs each recipe once, and releases
//! the lock. A tick that finds the lock held by a live process skips
//! instead of queueing behind it.

mod runner;
mod types;

pub use runner::Orchestrator;
pub use types::{CycleOutcome, OrchestratorError};
