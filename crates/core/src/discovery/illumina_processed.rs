//! Discovery over demultiplexed Illumina (FASTQ) storage layout.

use std::fs;
use std::path::Path;

use async_trait::async_trait;

use super::{DiscoveryError, RunDiscovery};
use crate::run::{has_tmp_suffix, RunHandle, RunId};
use crate::storage::StorageRef;

/// Marker left by BCL Convert once index metrics are written.
pub const INDEX_METRICS_FILE: &str = "InterOp/IndexMetricsOut.bin";
/// Marker left by bcl2fastq pipelines at the end of conversion.
pub const FASTQ_COMPLETE_FILE: &str = "Logs/FastqComplete.txt";

const FASTQ_EXTENSIONS: [&str; 2] = [".fastq.gz", ".fastq.bz2"];

/// Lists demultiplexed run directories.
///
/// A directory is a candidate when its name (minus any `.tmp` suffix) is a
/// valid Illumina run id and at least one FASTQ file exists anywhere below
/// it. *Completed* requires one of the demux end markers and a final name;
/// the rest are *in-progress*, so the two listings never overlap.
pub struct IlluminaProcessedDiscovery {
    storage: StorageRef,
}

impl IlluminaProcessedDiscovery {
    pub const NAME: &'static str = "illumina_fastq";

    pub fn new(storage: StorageRef) -> Self {
        Self { storage }
    }

    fn scan(&self, completed: bool) -> Result<Vec<RunHandle>, DiscoveryError> {
        let entries = fs::read_dir(self.storage.root())
            .map_err(|e| DiscoveryError::unavailable(&self.storage, e))?;

        let mut runs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DiscoveryError::unavailable(&self.storage, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let path = entry.path();

            if !path.is_dir() {
                continue;
            }
            let run_id = RunId::from_dir_name(&name);
            if !run_id.is_valid_illumina() {
                continue;
            }
            if !contains_fastq(&path) {
                continue;
            }

            let finished = path.join(INDEX_METRICS_FILE).is_file()
                || path.join(FASTQ_COMPLETE_FILE).is_file();
            let is_completed = finished && !has_tmp_suffix(&name);
            if is_completed != completed {
                continue;
            }

            runs.push(RunHandle::new(run_id, &self.storage, path, !is_completed));
        }

        Ok(runs)
    }
}

/// Recursive FASTQ probe, short-circuiting on the first hit. Unreadable
/// subtrees count as empty.
fn contains_fastq(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if contains_fastq(&path) {
                return true;
            }
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if FASTQ_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
                return true;
            }
        }
    }

    false
}

#[async_trait]
impl RunDiscovery for IlluminaProcessedDiscovery {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn storage(&self) -> &StorageRef {
        &self.storage
    }

    fn can_provide(&self) -> bool {
        true
    }

    async fn list_in_progress(&self) -> Result<Vec<RunHandle>, DiscoveryError> {
        self.scan(false)
    }

    async fn list_completed(&self) -> Result<Vec<RunHandle>, DiscoveryError> {
        self.scan(true)
    }
}
