//! No-op resolver.

use async_trait::async_trait;

use super::{ResolverError, RunConfigResolver, RunConfiguration};
use crate::run::RunHandle;

/// Default resolver for steps whose processor needs no per-run settings.
#[derive(Debug, Clone, Default)]
pub struct EmptyResolver;

impl EmptyResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RunConfigResolver for EmptyResolver {
    fn name(&self) -> &str {
        "empty"
    }

    async fn resolve(&self, _run: &RunHandle) -> Result<RunConfiguration, ResolverError> {
        Ok(RunConfiguration::new())
    }
}
