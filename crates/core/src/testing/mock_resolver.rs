//! Mock run configuration resolver for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::run::{RunHandle, RunId};
use crate::runconfig::{ResolverError, RunConfigResolver, RunConfiguration};

/// Mock implementation of the RunConfigResolver trait.
///
/// Resolves every run to a scriptable configuration, with one-shot error
/// injection. Cloning shares state.
#[derive(Clone)]
pub struct MockResolver {
    conf: Arc<RwLock<RunConfiguration>>,
    next_error: Arc<RwLock<Option<ResolverError>>>,
    calls: Arc<RwLock<Vec<RunId>>>,
}

impl Default for MockResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResolver {
    pub fn new() -> Self {
        Self {
            conf: Arc::new(RwLock::new(RunConfiguration::new())),
            next_error: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Replace the configuration returned for every run.
    pub async fn set_conf(&self, conf: RunConfiguration) {
        *self.conf.write().await = conf;
    }

    /// Fail the next resolution with the given error.
    pub async fn set_next_error(&self, error: ResolverError) {
        *self.next_error.write().await = Some(error);
    }

    /// Run ids resolved so far, in call order.
    pub async fn resolved(&self) -> Vec<RunId> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl RunConfigResolver for MockResolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn resolve(&self, run: &RunHandle) -> Result<RunConfiguration, ResolverError> {
        self.calls.write().await.push(run.run_id.clone());
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(self.conf.read().await.clone())
    }
}
