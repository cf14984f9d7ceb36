//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the pluggable recipe
//! boundaries, allowing full cycle testing without instruments, sample
//! sheets or rsync.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowline_core::testing::{fixtures, MockDiscovery, MockProcessor};
//!
//! let discovery = MockDiscovery::new(storage.clone());
//! discovery.push_completed(fixtures::handle(&storage, fixtures::RUN_A)).await;
//!
//! let processor = MockProcessor::new();
//!
//! // Drive a recipe cycle, then assert:
//! assert_eq!(processor.process_count().await, 1);
//! ```

mod mock_discovery;
mod mock_processor;
mod mock_resolver;

pub use mock_discovery::MockDiscovery;
pub use mock_processor::{MockProcessor, RecordedProcess};
pub use mock_resolver::MockResolver;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::fs;
    use std::path::{Path, PathBuf};

    use crate::discovery::{FASTQ_COMPLETE_FILE, RUN_COMPLETION_FILE, RUN_INFO_FILE};
    use crate::run::{RunHandle, RunId, TMP_SUFFIX};
    use crate::storage::StorageRef;

    /// A valid Illumina run id.
    pub const RUN_A: &str = "240115_NB500892_0123_AHABCDEFXX";
    /// A second valid Illumina run id, same instrument.
    pub const RUN_B: &str = "240116_NB500892_0124_AHGHIJKLXX";

    /// Create a completed raw run directory (both instrument markers).
    pub fn raw_run(root: &Path, run_id: &str) -> PathBuf {
        let dir = root.join(run_id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(RUN_INFO_FILE), "<RunInfo/>").unwrap();
        fs::write(dir.join(RUN_COMPLETION_FILE), "<RunCompletionStatus/>").unwrap();
        dir
    }

    /// Create a raw run directory the instrument is still writing.
    pub fn raw_run_in_progress(root: &Path, run_id: &str) -> PathBuf {
        let dir = root.join(run_id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(RUN_INFO_FILE), "<RunInfo/>").unwrap();
        dir
    }

    /// Create a finished run still under its in-flight `.tmp` name.
    pub fn raw_run_tmp(root: &Path, run_id: &str) -> PathBuf {
        let dir = root.join(format!("{run_id}{TMP_SUFFIX}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(RUN_INFO_FILE), "<RunInfo/>").unwrap();
        fs::write(dir.join(RUN_COMPLETION_FILE), "<RunCompletionStatus/>").unwrap();
        dir
    }

    /// Create a demultiplexed run directory with its end marker.
    pub fn fastq_run(root: &Path, run_id: &str) -> PathBuf {
        let dir = root.join(run_id);
        fs::create_dir_all(dir.join("Sample1")).unwrap();
        fs::write(dir.join("Sample1/S1_R1_001.fastq.gz"), b"\x1f\x8b").unwrap();
        let marker = dir.join(FASTQ_COMPLETE_FILE);
        fs::create_dir_all(marker.parent().unwrap()).unwrap();
        fs::write(marker, "done").unwrap();
        dir
    }

    /// Build a completed-run handle under `storage` without touching disk.
    pub fn handle(storage: &StorageRef, run_id: &str) -> RunHandle {
        RunHandle::new(
            RunId::new(run_id),
            storage,
            storage.entry_path(run_id),
            false,
        )
    }

    /// Build an in-progress handle under `storage` without touching disk.
    pub fn partial_handle(storage: &StorageRef, run_id: &str) -> RunHandle {
        RunHandle::new(
            RunId::new(run_id),
            storage,
            storage.entry_path(&format!("{run_id}{TMP_SUFFIX}")),
            true,
        )
    }
}
