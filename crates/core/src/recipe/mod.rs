//! Recipe composition and per-cycle execution.
//!
//! A recipe binds named storages, discovery providers, and an ordered
//! list of steps. Each poll cycle it lists candidate runs once and walks
//! every step over them; a step hands each unrecorded run to its
//! processor and appends successes to its own ledger. Failures stay out
//! of the ledger so the run is retried on the next cycle.

mod assemble;
mod registry;
mod runner;
mod step;
mod types;

pub use assemble::build_recipes;
pub use registry::StorageRegistry;
pub use runner::{ProviderBinding, Recipe};
pub use step::Step;
pub use types::{
    CycleReport, DiscoveryFailure, RecipeError, RunDisposition, RunReport, SkipReason, StepReport,
};
