//! Core library of the flowline post-acquisition processing daemon.
//!
//! Everything the daemon binary wires together lives here: run discovery
//! and classification, recipe/step composition, the append-only run
//! ledgers, the single-instance execution lock, the cycle orchestrator,
//! and the audit journal.

pub mod audit;
pub mod config;
pub mod discovery;
pub mod ledger;
pub mod lock;
pub mod metrics;
pub mod orchestrator;
pub mod processor;
pub mod recipe;
pub mod run;
pub mod runconfig;
pub mod runid;
pub mod storage;
pub mod testing;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditFilter, AuditHandle, AuditRecord,
    AuditStore, AuditWriter, SqliteAuditStore,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DaemonConfig,
    LoggingConfig, ProviderConfig, RecipeConfig, SampleSheetConfig, StepConfig, StorageConfig,
};
pub use discovery::{
    DiscoveryError, DiscoveryRegistry, IlluminaProcessedDiscovery, IlluminaRawDiscovery,
    NoopDiscovery, RunDiscovery,
};
pub use ledger::{LedgerError, RunLedger};
pub use lock::{ExecutionLock, LockError};
pub use orchestrator::{CycleOutcome, Orchestrator, OrchestratorError};
pub use processor::{
    ProcessOutcome, ProcessorError, ProcessorRegistry, RsyncProcessor, RunProcessor,
};
pub use recipe::{
    build_recipes, CycleReport, Recipe, RecipeError, Step, StorageRegistry, StepReport,
};
pub use run::{RunHandle, RunId, SequencerSource};
pub use runconfig::{
    EmptyResolver, ResolverError, RunConfigResolver, RunConfiguration, SampleSheetResolver,
};
pub use runid::{DefaultRunIdPolicy, PolicyError, RunIdPolicy};
pub use storage::{expand_roots, StorageRef, StorageTechnology};
