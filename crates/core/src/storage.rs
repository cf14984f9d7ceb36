//! Named storage roots holding sequencing runs.
//!
//! A [`StorageRef`] is identity plus path resolution: recipes register
//! storages by name and steps look them up, nothing more. Behavior that
//! touches the storage contents lives in the discovery providers and
//! processors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::run::SequencerSource;

/// How the storage root is reached from the orchestrator host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTechnology {
    /// Root on a local filesystem.
    #[default]
    Local,
    /// Root on a remote-mountable filesystem (NFS, CIFS). Still addressed
    /// through a local mount point.
    Remote,
}

impl StorageTechnology {
    /// Lowercase label matching the configuration spelling.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// A named, addressable root location for run directories.
///
/// Immutable once registered in a recipe. Multiple refs may share a root
/// path prefix; identity is the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRef {
    /// Unique name within a recipe.
    pub name: String,
    /// Root directory holding zero or more runs.
    pub root: PathBuf,
    #[serde(default)]
    pub technology: StorageTechnology,
    /// Instrument writing into this storage, when known.
    #[serde(default)]
    pub sequencer: SequencerSource,
}

impl StorageRef {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            technology: StorageTechnology::Local,
            sequencer: SequencerSource::unknown(),
        }
    }

    pub fn with_technology(mut self, technology: StorageTechnology) -> Self {
        self.technology = technology;
        self
    }

    pub fn with_sequencer(mut self, sequencer: SequencerSource) -> Self {
        self.sequencer = sequencer;
        self
    }

    /// Resolves the path of an entry directly under this storage root.
    pub fn entry_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl std::fmt::Display for StorageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.root.display())
    }
}

/// Expands a colon-separated list of roots into uniquely named storages.
///
/// With more than one root the names get a 1-based numeric suffix
/// (`raw1`, `raw2`, ...); a single root keeps the bare prefix. Empty
/// segments are skipped.
pub fn expand_roots(prefix: &str, roots: &str, technology: StorageTechnology) -> Vec<StorageRef> {
    let paths: Vec<&str> = roots.split(':').filter(|s| !s.trim().is_empty()).collect();

    paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let name = if paths.len() > 1 {
                format!("{}{}", prefix, i + 1)
            } else {
                prefix.to_string()
            };
            StorageRef::new(name, path.trim()).with_technology(technology)
        })
        .collect()
}
