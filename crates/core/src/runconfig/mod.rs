//! Per-run configuration resolution.
//!
//! A step asks its resolver for the configuration of one discovered run
//! before invoking the processor. The result is opaque key/value data
//! ([`RunConfiguration`]); the core passes it through without interpreting
//! it. Resolvers are a swappable boundary: [`EmptyResolver`] for steps that
//! need nothing, [`SampleSheetResolver`] to locate (not parse) the Illumina
//! sample sheet of a run.

mod empty;
mod error;
mod samplesheet;
mod traits;
mod types;

pub use empty::EmptyResolver;
pub use error::ResolverError;
pub use samplesheet::SampleSheetResolver;
pub use traits::RunConfigResolver;
pub use types::RunConfiguration;
