//! Error types for Herald.
//!
//! Engine operations never fail loudly: subscribe returns `None`, unsubscribe
//! returns `false`. These errors only surface from constructors and the
//! `try_*` variants that report why a specifier was rejected.

use std::path::PathBuf;
use thiserror::Error;

/// Herald errors.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Pattern failed to compile.
    #[error("Invalid topic pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Specifier exceeds the configured length limit.
    #[error("Topic too long: {len} bytes (max {max})")]
    TopicTooLong {
        /// Length of the rejected specifier.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Config file could not be read.
    #[error("Failed to read config file {}: {source}", .path.display())]
    ConfigRead {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Config contents could not be parsed.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result alias for Herald operations.
pub type Result<T> = std::result::Result<T, HeraldError>;
