//! Error types for harness setup and I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors raised before a run starts or while persisting its artifacts
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Kernel descriptor or run configuration is inconsistent
    #[error("Configuration error: {reason}")]
    Configuration {
        /// What failed validation
        reason: String,
    },

    /// Processing-element field does not fit its bit slot
    #[error("PE field `{field}` = {value} does not fit in {bits} bits")]
    PeField {
        /// Field name
        field: &'static str,
        /// Offending value
        value: u32,
        /// Width of the slot
        bits: u32,
    },

    /// I/O error while reading a descriptor or writing a trace
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// TOML file could not be parsed
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// File that was read
        path: PathBuf,
        /// Underlying parser error
        source: toml::de::Error,
    },
}

impl HarnessError {
    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a parse error for `path`
    pub fn parse(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was raised by descriptor/run validation
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}
