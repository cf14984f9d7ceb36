//! Discovery error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageRef;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The storage root cannot be enumerated (missing path, permissions,
    /// dead mount). The orchestrator skips this storage for the cycle and
    /// the other storages proceed.
    #[error("storage {storage} unreachable at {path}: {source}")]
    Unavailable {
        storage: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Provider misconfiguration. Unlike `Unavailable` this does not heal
    /// by waiting for the next cycle.
    #[error("discovery provider {provider} misconfigured for storage {storage}: {detail}")]
    Invalid {
        provider: String,
        storage: String,
        detail: String,
    },
}

impl DiscoveryError {
    pub fn unavailable(storage: &StorageRef, source: io::Error) -> Self {
        Self::Unavailable {
            storage: storage.name.clone(),
            path: storage.root.clone(),
            source,
        }
    }

    pub fn invalid(
        provider: impl Into<String>,
        storage: &StorageRef,
        detail: impl Into<String>,
    ) -> Self {
        Self::Invalid {
            provider: provider.into(),
            storage: storage.name.clone(),
            detail: detail.into(),
        }
    }

    /// True for the transient storage-unreachable kind.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
