//! The resolver contract.

use async_trait::async_trait;

use super::{ResolverError, RunConfiguration};
use crate::run::RunHandle;

/// Strategy producing the per-run configuration a processor consumes.
///
/// Implementations read external sources (run directory, shared sample
/// sheet folder); the returned map is opaque to the core.
#[async_trait]
pub trait RunConfigResolver: Send + Sync {
    /// Stable resolver name used in configuration and logs.
    fn name(&self) -> &str;

    async fn resolve(&self, run: &RunHandle) -> Result<RunConfiguration, ResolverError>;
}
