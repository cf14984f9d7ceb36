//! The discovery contract.

use async_trait::async_trait;

use super::DiscoveryError;
use crate::run::RunHandle;
use crate::storage::StorageRef;

/// Lists and classifies the runs under one storage root.
///
/// One instance is bound to one [`StorageRef`] for the process lifetime.
/// Listing must not mutate the storage.
#[async_trait]
pub trait RunDiscovery: Send + Sync {
    /// Stable provider name used in configuration and logs
    /// (`illumina_bcl`, `illumina_fastq`, ...).
    fn name(&self) -> &str;

    fn storage(&self) -> &StorageRef;

    /// False when the provider has nothing to offer by construction
    /// (unconfigured placeholder). Not an error state: the caller simply
    /// skips the registration.
    fn can_provide(&self) -> bool;

    /// Runs still being written: completion marker absent, or the
    /// directory still carries the in-flight rename suffix.
    async fn list_in_progress(&self) -> Result<Vec<RunHandle>, DiscoveryError>;

    /// Runs whose completion marker is present and whose directory name is
    /// final.
    async fn list_completed(&self) -> Result<Vec<RunHandle>, DiscoveryError>;
}
