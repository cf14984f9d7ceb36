//! Run identity types.
//!
//! A run is one sequencing-instrument acquisition, materialized as a
//! directory tree under a storage root. [`RunId`] is its stable name;
//! [`RunHandle`] is one discovery sighting of it, scoped to a single poll
//! cycle.

use std::fmt;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::storage::StorageRef;

/// Directory-name suffix marking a run still being written or mirrored.
pub const TMP_SUFFIX: &str = ".tmp";

// YYMMDD (or YYYYMMDD on newer instruments), instrument serial, zero-padded
// run number, flowcell id.
static ILLUMINA_RUN_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{6}(?:[0-9]{2})?_[a-zA-Z0-9]+_[0-9]{4}_[a-zA-Z0-9_+-]+$")
        .expect("run id pattern is valid")
});

/// Strips a trailing [`TMP_SUFFIX`] if present.
pub fn strip_tmp_suffix(name: &str) -> &str {
    name.strip_suffix(TMP_SUFFIX).unwrap_or(name)
}

/// True when the directory name carries the in-flight rename suffix.
pub fn has_tmp_suffix(name: &str) -> bool {
    name.ends_with(TMP_SUFFIX)
}

/// Opaque, technology-specific identifier of one sequencing run.
///
/// Equality and hashing are by trimmed string value. The id is stable
/// across the `.tmp` ⇄ final directory-name transition because it is always
/// derived from the directory name with the suffix removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// Derives the id from a directory name, stripping any `.tmp` suffix.
    pub fn from_dir_name(name: &str) -> Self {
        Self::new(strip_tmp_suffix(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks the Illumina run folder naming convention
    /// (`YYMMDD_INSTRUMENT_NNNN_FLOWCELL`, 8-digit dates accepted).
    pub fn is_valid_illumina(&self) -> bool {
        ILLUMINA_RUN_ID.is_match(&self.0)
    }

    /// Instrument serial number segment of a valid Illumina id.
    pub fn illumina_instrument(&self) -> Option<&str> {
        if !self.is_valid_illumina() {
            return None;
        }
        self.0.split('_').nth(1)
    }

    /// Run number segment of a valid Illumina id.
    pub fn illumina_run_number(&self) -> Option<&str> {
        if !self.is_valid_illumina() {
            return None;
        }
        self.0.split('_').nth(2)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Metadata describing the instrument a run came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SequencerSource {
    /// Source for storages with no configured instrument metadata.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.id.is_none()
            && self.manufacturer.is_none()
            && self.model.is_none()
            && self.serial_number.is_none()
            && self.description.is_none()
    }
}

impl fmt::Display for SequencerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => f.write_str(id),
            None => f.write_str("unknown sequencer"),
        }
    }
}

/// One discovered run.
///
/// Created fresh on every discovery pass and never mutated; a new
/// classification always yields a new handle. `partial=true` marks a run
/// seen while still being written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: RunId,
    pub storage: StorageRef,
    /// Actual on-disk directory, possibly still `.tmp`-suffixed.
    pub location: PathBuf,
    pub source: SequencerSource,
    pub partial: bool,
}

impl RunHandle {
    /// Builds a handle for a run sighted under `storage`; the sequencer
    /// source is taken from the storage registration.
    pub fn new(
        run_id: RunId,
        storage: &StorageRef,
        location: impl Into<PathBuf>,
        partial: bool,
    ) -> Self {
        Self {
            run_id,
            source: storage.sequencer.clone(),
            storage: storage.clone(),
            location: location.into(),
            partial,
        }
    }

    /// On-disk directory name, `.tmp` suffix included when present.
    pub fn dir_name(&self) -> Option<&str> {
        self.location.file_name().and_then(|n| n.to_str())
    }
}
