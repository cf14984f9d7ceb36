//! Run discovery and completion classification.
//!
//! A discovery provider lists the runs present under one storage root and
//! classifies each as *in-progress* or *completed* using the layout
//! conventions of its technology. Classification is read-only; a run is
//! sighted fresh on every poll cycle.
//!
//! Outcome kinds are explicit: `Ok` with an empty vec means no runs (a
//! valid state), [`DiscoveryError::Unavailable`] means the storage cannot
//! be enumerated, and the remaining error variants are misconfiguration.
//! Callers branch on the kind instead of treating every empty list alike.

mod error;
mod illumina_processed;
mod illumina_raw;
mod noop;
mod registry;
mod traits;

pub use error::DiscoveryError;
pub use illumina_processed::{IlluminaProcessedDiscovery, FASTQ_COMPLETE_FILE, INDEX_METRICS_FILE};
pub use illumina_raw::{IlluminaRawDiscovery, RUN_COMPLETION_FILE, RUN_INFO_FILE};
pub use noop::NoopDiscovery;
pub use registry::DiscoveryRegistry;
pub use traits::RunDiscovery;
