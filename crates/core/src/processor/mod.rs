//! The processor boundary.
//!
//! A step hands a discovered run, its resolved configuration, and the
//! output storage to a named processor and gets back success or failure.
//! Processors are opaque to the core: they may shell out to external
//! binaries (rsync, bcl-convert, QC tools) and own partial-failure
//! recovery of that invocation. The core ships the registry plus the rsync
//! mirror used by sync stages; demultiplexing and QC processors are
//! deployment plugins.

mod error;
mod registry;
mod rsync;
mod traits;

pub use error::ProcessorError;
pub use registry::ProcessorRegistry;
pub use rsync::RsyncProcessor;
pub use traits::{ProcessOutcome, RunProcessor};
