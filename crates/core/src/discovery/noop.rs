//! Placeholder discovery with nothing to offer.

use async_trait::async_trait;

use super::{DiscoveryError, RunDiscovery};
use crate::run::RunHandle;
use crate::storage::StorageRef;

/// Provider for registrations that are configured but intentionally inert,
/// e.g. a storage kept in a recipe for output only. `can_provide()` is
/// false and both listings are empty.
pub struct NoopDiscovery {
    storage: StorageRef,
}

impl NoopDiscovery {
    pub const NAME: &'static str = "noop";

    pub fn new(storage: StorageRef) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RunDiscovery for NoopDiscovery {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn storage(&self) -> &StorageRef {
        &self.storage
    }

    fn can_provide(&self) -> bool {
        false
    }

    async fn list_in_progress(&self) -> Result<Vec<RunHandle>, DiscoveryError> {
        Ok(Vec::new())
    }

    async fn list_completed(&self) -> Result<Vec<RunHandle>, DiscoveryError> {
        Ok(Vec::new())
    }
}
