//! Error types for the parts of litepost that live outside the core pipeline.
//!
//! Compilation, assertion evaluation and script execution never fail; their
//! problems are reported as data on `ResponseDescriptor` / `TestResult`. This
//! type covers configuration, input loading, client construction and CLI usage.

use std::path::PathBuf;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file could not be read
    #[error("Failed to read `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be written
    #[error("Failed to write `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file was read but did not contain the expected JSON document
    #[error("Failed to parse `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized for output
    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A configuration value was present but unusable
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// Command-line arguments were missing or malformed
    #[error("{0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
