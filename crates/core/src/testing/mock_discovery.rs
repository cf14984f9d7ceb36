//! Mock discovery provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::discovery::{DiscoveryError, RunDiscovery};
use crate::run::RunHandle;
use crate::storage::StorageRef;

/// Mock implementation of the RunDiscovery trait.
///
/// Provides controllable behavior for testing:
/// - Set the completed and in-progress listings
/// - Inject a one-shot listing error
/// - Count listing calls
///
/// Cloning shares state, so a clone handed to a registry factory stays
/// scriptable from the test body.
#[derive(Clone)]
pub struct MockDiscovery {
    storage: StorageRef,
    name: String,
    completed: Arc<RwLock<Vec<RunHandle>>>,
    in_progress: Arc<RwLock<Vec<RunHandle>>>,
    next_error: Arc<RwLock<Option<DiscoveryError>>>,
    list_calls: Arc<RwLock<usize>>,
}

impl MockDiscovery {
    pub const NAME: &'static str = "mock";

    /// Create a new mock discovery bound to `storage`.
    pub fn new(storage: StorageRef) -> Self {
        Self {
            storage,
            name: Self::NAME.to_string(),
            completed: Arc::new(RwLock::new(Vec::new())),
            in_progress: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            list_calls: Arc::new(RwLock::new(0)),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the completed listing.
    pub async fn set_completed(&self, runs: Vec<RunHandle>) {
        *self.completed.write().await = runs;
    }

    /// Append one run to the completed listing.
    pub async fn push_completed(&self, run: RunHandle) {
        self.completed.write().await.push(run);
    }

    /// Replace the in-progress listing.
    pub async fn set_in_progress(&self, runs: Vec<RunHandle>) {
        *self.in_progress.write().await = runs;
    }

    /// Append one run to the in-progress listing.
    pub async fn push_in_progress(&self, run: RunHandle) {
        self.in_progress.write().await.push(run);
    }

    /// Fail the next listing call with the given error.
    pub async fn set_next_error(&self, error: DiscoveryError) {
        *self.next_error.write().await = Some(error);
    }

    /// Number of listing calls (completed and in-progress combined).
    pub async fn list_count(&self) -> usize {
        *self.list_calls.read().await
    }

    async fn list(&self, source: &RwLock<Vec<RunHandle>>) -> Result<Vec<RunHandle>, DiscoveryError> {
        *self.list_calls.write().await += 1;
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(source.read().await.clone())
    }
}

#[async_trait]
impl RunDiscovery for MockDiscovery {
    fn name(&self) -> &str {
        &self.name
    }

    fn storage(&self) -> &StorageRef {
        &self.storage
    }

    fn can_provide(&self) -> bool {
        true
    }

    async fn list_in_progress(&self) -> Result<Vec<RunHandle>, DiscoveryError> {
        self.list(&self.in_progress).await
    }

    async fn list_completed(&self) -> Result<Vec<RunHandle>, DiscoveryError> {
        self.list(&self.completed).await
    }
}
