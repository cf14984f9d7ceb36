use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::run::SequencerSource;
use crate::storage::StorageTechnology;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Recipes to run each cycle, in declaration order.
    #[serde(default, rename = "recipe")]
    pub recipes: Vec<RecipeConfig>,
}

/// Daemon process configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    /// Directory holding the lock file, step ledgers and the audit journal.
    #[serde(default = "default_var_dir")]
    pub var_dir: PathBuf,
    /// Execution lock path. Defaults to `<var_dir>/flowline.lock`.
    #[serde(default)]
    pub lock_file: Option<PathBuf>,
    /// Seconds between processing cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Run a single cycle and exit instead of polling.
    #[serde(default)]
    pub run_once: bool,
    /// Consecutive lock acquisition failures tolerated before the daemon
    /// gives up. 0 means never give up.
    #[serde(default = "default_max_consecutive_lock_failures")]
    pub max_consecutive_lock_failures: u32,
    /// Capacity of the audit event channel.
    #[serde(default = "default_audit_buffer")]
    pub audit_buffer: usize,
}

impl DaemonConfig {
    /// Effective lock file path.
    pub fn lock_path(&self) -> PathBuf {
        match &self.lock_file {
            Some(path) => path.clone(),
            None => self.var_dir.join("flowline.lock"),
        }
    }

    /// Path of the SQLite audit journal.
    pub fn audit_db_path(&self) -> PathBuf {
        self.var_dir.join("audit.db")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            var_dir: default_var_dir(),
            lock_file: None,
            poll_interval_secs: default_poll_interval_secs(),
            run_once: false,
            max_consecutive_lock_failures: default_max_consecutive_lock_failures(),
            audit_buffer: default_audit_buffer(),
        }
    }
}

fn default_var_dir() -> PathBuf {
    PathBuf::from("/var/lib/flowline")
}

fn default_poll_interval_secs() -> u64 {
    1800
}

fn default_max_consecutive_lock_failures() -> u32 {
    5
}

fn default_audit_buffer() -> usize {
    1000
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Tracing filter directive, e.g. "info" or "flowline_core=debug".
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// One recipe: storages, discovery providers and processing steps.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecipeConfig {
    /// Unique recipe name, used in ledger file names and audit events.
    pub name: String,
    /// Free-text description of the pipeline.
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "storage")]
    pub storages: Vec<StorageConfig>,
    #[serde(default, rename = "provider")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default, rename = "step")]
    pub steps: Vec<StepConfig>,
}

/// A named storage declaration.
///
/// `roots` is a colon-separated list of directories. A single root keeps
/// the declared name; multiple roots expand into `<name>1`, `<name>2`, ...
/// with one storage per root.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub name: String,
    pub roots: String,
    #[serde(default)]
    pub technology: StorageTechnology,
    /// Instrument writing into this storage, when known.
    #[serde(default)]
    pub sequencer: Option<SequencerSource>,
}

impl StorageConfig {
    /// Non-empty root segments of the colon-separated `roots` list.
    pub fn root_segments(&self) -> Vec<&str> {
        self.roots
            .split(':')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Binds a discovery provider to a declared storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Provider name in the discovery registry, e.g. "illumina_bcl".
    pub name: String,
    /// Name of a storage declared in the same recipe.
    pub storage: String,
    /// Include runs still being written by the instrument.
    #[serde(default)]
    pub scan_in_progress: bool,
}

/// One processing step of a recipe.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StepConfig {
    /// Unique step name within the recipe.
    pub name: String,
    /// Processor name in the processor registry, e.g. "rsync".
    pub processor: String,
    /// Single-root storage receiving the step output.
    pub output_storage: String,
    /// Run configuration resolver ("empty" or "illumina_samplesheet").
    #[serde(default = "default_resolver")]
    pub resolver: String,
    /// Template for the output run id; the input id when absent.
    #[serde(default)]
    pub run_id_template: Option<String>,
    /// Sample sheet lookup (required when resolver = "illumina_samplesheet").
    #[serde(default)]
    pub samplesheet: Option<SampleSheetConfig>,
    /// Free-form step configuration merged into every resolved run
    /// configuration.
    #[serde(default)]
    pub conf: BTreeMap<String, String>,
}

fn default_resolver() -> String {
    "empty".to_string()
}

/// Where the sample sheet resolver looks for sheets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SampleSheetConfig {
    /// Directory holding per-run sample sheets.
    pub dir: PathBuf,
    /// File name prefix (default "design").
    #[serde(default)]
    pub prefix: Option<String>,
    /// File extension without the dot (default "csv").
    #[serde(default)]
    pub extension: Option<String>,
    /// Check the run directory itself before the sheet directory.
    #[serde(default)]
    pub search_run_dir_first: Option<bool>,
}
