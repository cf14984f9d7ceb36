//! Daemon configuration: file format, loading and validation.
//!
//! Configuration is a TOML file with environment overrides
//! (`FLOWLINE_` prefix). [`load_config`] parses and [`validate_config`]
//! checks the structural rules the builder cannot express through types,
//! such as name uniqueness and cross-references between sections.

mod loader;
mod types;
mod validate;

pub use loader::{load_config, load_config_from_str};
pub use types::*;
pub use validate::validate_config;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
