//! Rsync-backed run mirroring.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use super::error::ProcessorError;
use super::traits::{ProcessOutcome, RunProcessor};
use crate::run::{RunHandle, TMP_SUFFIX};
use crate::runconfig::RunConfiguration;
use crate::storage::StorageRef;

/// Configuration key that forces or suppresses partial-sync behavior.
/// When absent, the handle's own partial flag decides.
const PARTIAL_SYNC_KEY: &str = "partial.sync";

/// Mirrors a run directory into the output storage with the system
/// `rsync` binary.
///
/// A partial run is mirrored into `<run_id>.tmp` so downstream discovery
/// keeps classifying it as in progress. Once the run completes, the
/// `.tmp` directory from earlier passes is promoted to the final name and
/// a closing rsync transfers whatever the sequencer wrote last. Re-running
/// is cheap because rsync only moves the delta.
pub struct RsyncProcessor {
    rsync_path: PathBuf,
    extra_args: Vec<String>,
}

impl RsyncProcessor {
    pub const NAME: &'static str = "rsync";

    pub fn new() -> Self {
        Self {
            rsync_path: PathBuf::from("rsync"),
            extra_args: Vec::new(),
        }
    }

    /// Overrides the binary location, for hosts where rsync is not on PATH.
    pub fn with_rsync_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rsync_path = path.into();
        self
    }

    /// Appends extra rsync flags, e.g. `--bwlimit` on shared links.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn build_args(&self, input: &Path, dest: &Path) -> Vec<String> {
        // LANG=C plus these flags keep the transfer byte-faithful while
        // letting the archive land under the daemon's own uid/gid.
        let mut args = vec![
            "-a".to_string(),
            "--no-owner".to_string(),
            "--no-group".to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());

        // Trailing slash so rsync copies the directory contents, not the
        // directory itself.
        let mut source = input.to_string_lossy().to_string();
        if !source.ends_with('/') {
            source.push('/');
        }
        args.push(source);
        args.push(dest.to_string_lossy().to_string());
        args
    }

    async fn run_rsync(&self, run: &RunHandle, input: &Path, dest: &Path) -> Result<(), ProcessorError> {
        let args = self.build_args(input, dest);
        debug!(run_id = %run.run_id, ?args, "invoking rsync");

        let output = Command::new(&self.rsync_path)
            .args(&args)
            .env("LANG", "C")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProcessorError::tool_not_found("rsync", self.rsync_path.clone())
                } else {
                    ProcessorError::io(&run.run_id, e)
                }
            })?;

        if !output.status.success() {
            return Err(ProcessorError::CommandFailed {
                tool: "rsync".to_string(),
                run_id: run.run_id.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl Default for RsyncProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunProcessor for RsyncProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(
        &self,
        run: &RunHandle,
        conf: &RunConfiguration,
        output: &StorageRef,
    ) -> Result<ProcessOutcome, ProcessorError> {
        let input = run.location.as_path();
        if !input.is_dir() {
            return Err(ProcessorError::input_missing(&run.run_id, input));
        }
        if output.root() == run.storage.root() {
            return Err(ProcessorError::same_storage(&run.run_id, output.root()));
        }

        let final_dir = output.entry_path(run.run_id.as_str());
        let tmp_dir = output.entry_path(&format!("{}{}", run.run_id.as_str(), TMP_SUFFIX));
        if final_dir.exists() {
            return Err(ProcessorError::output_exists(&run.run_id, final_dir));
        }

        let partial = conf.get_bool(PARTIAL_SYNC_KEY, run.partial);
        let dest = if partial {
            tmp_dir
        } else {
            if tmp_dir.is_dir() {
                // Promote the partial mirror so the closing rsync only
                // transfers what the sequencer wrote since the last pass.
                fs::rename(&tmp_dir, &final_dir)
                    .map_err(|e| ProcessorError::io(&run.run_id, e))?;
            }
            final_dir
        };

        fs::create_dir_all(&dest).map_err(|e| ProcessorError::io(&run.run_id, e))?;
        self.run_rsync(run, input, &dest).await?;

        info!(
            run_id = %run.run_id,
            dest = %dest.display(),
            partial,
            "run synchronized"
        );
        Ok(ProcessOutcome::at(&dest).with_message(format!(
            "{} into {}",
            if partial { "partial sync" } else { "synchronized" },
            dest.display()
        )))
    }
}
