//! Illumina sample-sheet locator.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{ResolverError, RunConfigResolver, RunConfiguration};
use crate::run::RunHandle;

const DEFAULT_PREFIX: &str = "design";
const DEFAULT_EXTENSION: &str = "csv";

/// Locates the sample sheet of a run without parsing it.
///
/// The expected filename is `<prefix>_<instrument>_<run-number>.<ext>`,
/// with the run number unpadded (`design_NB500892_123.csv` for run
/// `240115_NB500892_0123_AHABCDEFXX`). The run directory is searched first
/// when configured, then the shared sample-sheet directory. The sheet's
/// path and the id segments are handed to the processor; interpreting the
/// sheet is the processor's business.
#[derive(Debug, Clone)]
pub struct SampleSheetResolver {
    samplesheet_dir: PathBuf,
    prefix: String,
    extension: String,
    search_run_dir_first: bool,
}

impl SampleSheetResolver {
    pub fn new(samplesheet_dir: impl Into<PathBuf>) -> Self {
        Self {
            samplesheet_dir: samplesheet_dir.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            search_run_dir_first: false,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_search_run_dir_first(mut self, enabled: bool) -> Self {
        self.search_run_dir_first = enabled;
        self
    }

    fn sheet_filename(&self, run: &RunHandle) -> Result<(String, String, String), ResolverError> {
        let instrument = run.run_id.illumina_instrument().ok_or_else(|| {
            ResolverError::invalid_run_id(&run.run_id, "not an Illumina run id")
        })?;
        let run_number: u32 = run
            .run_id
            .illumina_run_number()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| {
                ResolverError::invalid_run_id(&run.run_id, "run number segment is not numeric")
            })?;

        Ok((
            format!(
                "{}_{}_{}.{}",
                self.prefix, instrument, run_number, self.extension
            ),
            instrument.to_string(),
            run_number.to_string(),
        ))
    }

    fn candidates(&self, run: &RunHandle, filename: &str) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if self.search_run_dir_first {
            paths.push(run.location.join(filename));
        }
        paths.push(self.samplesheet_dir.join(filename));
        paths
    }
}

#[async_trait]
impl RunConfigResolver for SampleSheetResolver {
    fn name(&self) -> &str {
        "illumina_samplesheet"
    }

    async fn resolve(&self, run: &RunHandle) -> Result<RunConfiguration, ResolverError> {
        let (filename, instrument, run_number) = self.sheet_filename(run)?;

        for candidate in self.candidates(run, &filename) {
            if candidate.is_file() {
                debug!(run_id = %run.run_id, path = %candidate.display(), "sample sheet located");
                let mut conf = RunConfiguration::new();
                conf.set("samplesheet.path", path_string(&candidate));
                conf.set("samplesheet.filename", filename);
                conf.set("run.instrument", instrument);
                conf.set("run.number", run_number);
                return Ok(conf);
            }
        }

        Err(ResolverError::not_found(
            &run.run_id,
            format!(
                "no {} under {}{}",
                filename,
                self.samplesheet_dir.display(),
                if self.search_run_dir_first {
                    " or the run directory"
                } else {
                    ""
                }
            ),
        ))
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
