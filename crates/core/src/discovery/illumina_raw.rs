//! Discovery over raw Illumina (BCL) storage layout.

use std::fs;

use async_trait::async_trait;

use super::{DiscoveryError, RunDiscovery};
use crate::run::{has_tmp_suffix, RunHandle, RunId};
use crate::storage::StorageRef;

/// Marker written by the instrument when acquisition starts.
pub const RUN_INFO_FILE: &str = "RunInfo.xml";
/// Marker written by the instrument when acquisition ends.
pub const RUN_COMPLETION_FILE: &str = "RunCompletionStatus.xml";

/// Lists raw run directories written by an Illumina sequencer.
///
/// A directory is a candidate when its name (minus any `.tmp` suffix) is a
/// valid Illumina run id and it contains `RunInfo.xml`. Among candidates,
/// *completed* means the completion marker exists and the name is final;
/// everything else is *in-progress*. A run being renamed from `X.tmp` to
/// `X` can miss both listings of one cycle; it reappears on the next scan
/// under the same run id.
pub struct IlluminaRawDiscovery {
    storage: StorageRef,
}

impl IlluminaRawDiscovery {
    pub const NAME: &'static str = "illumina_bcl";

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
            if !path.join(RUN_INFO_FILE).is_file() {
                continue;
            }

            let finished = path.join(RUN_COMPLETION_FILE).is_file();
            let is_completed = finished && !has_tmp_suffix(&name);
            if is_completed != completed {
                continue;
            }

            runs.push(RunHandle::new(run_id, &self.storage, path, !is_completed));
        }

        Ok(runs)
    }
}

#[async_trait]
impl RunDiscovery for IlluminaRawDiscovery {
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    const RUN: &str = "240115_NB500892_0123_AHABCDEFXX";

    fn make_run(root: &Path, dir_name: &str, started: bool, finished: bool) {
        let dir = root.join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        if started {
            fs::write(dir.join(RUN_INFO_FILE), "<RunInfo/>").unwrap();
        }
        if finished {
            fs::write(dir.join(RUN_COMPLETION_FILE), "<RunCompletionStatus/>").unwrap();
        }
    }

    fn discovery(root: &Path) -> IlluminaRawDiscovery {
        IlluminaRawDiscovery::new(StorageRef::new("raw", root))
    }

    #[tokio::test]
    async fn test_completed_run_listed_once() {
        let dir = TempDir::new().unwrap();
        make_run(dir.path(), RUN, true, true);
        let d = discovery(dir.path());

        let completed = d.list_completed().await.unwrap();
        let in_progress = d.list_in_progress().await.unwrap();

        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].run_id, RunId::new(RUN));
        assert!(!completed[0].partial);
        assert!(in_progress.is_empty());
    }

    #[tokio::test]
    async fn test_unfinished_run_is_in_progress() {
        let dir = TempDir::new().unwrap();
        make_run(dir.path(), RUN, true, false);
        let d = discovery(dir.path());

        let in_progress = d.list_in_progress().await.unwrap();
        assert_eq!(in_progress.len(), 1);
        assert!(in_progress[0].partial);
        assert!(d.list_completed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tmp_suffix_overrides_completion_marker() {
        let dir = TempDir::new().unwrap();
        let tmp_name = format!("{RUN}.tmp");
        make_run(dir.path(), &tmp_name, true, true);
        let d = discovery(dir.path());

        let in_progress = d.list_in_progress().await.unwrap();
        assert_eq!(in_progress.len(), 1);
        // Run id never carries the suffix.
        assert_eq!(in_progress[0].run_id, RunId::new(RUN));
        assert_eq!(in_progress[0].dir_name(), Some(tmp_name.as_str()));
        assert!(d.list_completed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename_reclassifies_same_run_id() {
        let dir = TempDir::new().unwrap();
        let tmp_name = format!("{RUN}.tmp");
        make_run(dir.path(), &tmp_name, true, true);
        let d = discovery(dir.path());

        let before = d.list_in_progress().await.unwrap();
        fs::rename(dir.path().join(&tmp_name), dir.path().join(RUN)).unwrap();
        let after = d.list_completed().await.unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 1);
        assert_eq!(before[0].run_id, after[0].run_id);
        assert!(d.list_in_progress().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_candidates_are_ignored() {
        let dir = TempDir::new().unwrap();
        // Plain file with a run-like name.
        fs::write(dir.path().join(RUN), "not a dir").unwrap();
        // Directory with an invalid name.
        make_run(dir.path(), "scratch", true, true);
        // Valid name but RunInfo.xml missing.
        make_run(dir.path(), "240116_NB500892_0124_AHABCDEFXX", false, true);
        let d = discovery(dir.path());

        assert!(d.list_completed().await.unwrap().is_empty());
        assert!(d.list_in_progress().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_root_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("no-such-root");
        let d = discovery(&missing);

        let err = d.list_completed().await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_classification_is_exclusive() {
        let dir = TempDir::new().unwrap();
        make_run(dir.path(), RUN, true, true);
        make_run(dir.path(), "240116_NB500892_0124_AHABCDEFXX", true, false);
        make_run(
            dir.path(),
            "240117_NB500892_0125_AHABCDEFXX.tmp",
            true,
            true,
        );
        let d = discovery(dir.path());

        let completed = d.list_completed().await.unwrap();
        let in_progress = d.list_in_progress().await.unwrap();

        for run in &completed {
            assert!(
                !in_progress.iter().any(|r| r.run_id == run.run_id),
                "{} in both lists",
                run.run_id
            );
        }
        assert_eq!(completed.len() + in_progress.len(), 3);
    }

    #[tokio::test]
    async fn test_handle_carries_storage_sequencer() {
        use crate::run::SequencerSource;

        let dir = TempDir::new().unwrap();
        make_run(dir.path(), RUN, true, true);
        let storage = StorageRef::new("raw", dir.path())
            .with_sequencer(SequencerSource::with_id("NB500892"));
        let d = IlluminaRawDiscovery::new(storage);

        let completed = d.list_completed().await.unwrap();
        assert_eq!(completed[0].source.id.as_deref(), Some("NB500892"));
    }
}
