//! Error types for data-lineage
//!
//! Every failure is surfaced to the caller; nothing is retried internally.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// data-lineage error types
#[derive(Error, Debug)]
pub enum Error {
    /// Registry document exists but cannot be parsed (no auto-repair)
    #[error("Registry document corrupt at {}: {reason}\nRestore it from backup; the registry is never rewritten from a corrupt state", path.display())]
    RegistryCorrupt {
        /// Path of the unreadable document
        path: PathBuf,
        /// Parser or validation message
        reason: String,
    },

    /// No version with this identifier is registered
    #[error("Version not found: {0}")]
    VersionNotFound(String),

    /// Explicit parent identifier does not resolve
    #[error("Parent version not found: {0}")]
    ParentNotFound(String),

    /// Artifact file referenced by a version is absent on disk
    #[error("Artifact missing: {filename} (version {version_id})")]
    ArtifactMissing {
        /// Owning version
        version_id: String,
        /// Artifact file name inside the version directory
        filename: String,
    },

    /// Concatenated artifacts disagree on their columns
    #[error("Schema mismatch: expected columns {expected:?}, found {found:?}")]
    SchemaMismatch {
        /// Columns of the first artifact
        expected: Vec<String>,
        /// Columns of the diverging artifact
        found: Vec<String>,
    },

    /// Parent pointers loop back on themselves
    #[error("Lineage cycle detected at version {0}\nParent pointers must form a forest; the registry document was edited or corrupted")]
    LineageCycle(String),

    /// Caller supplied an argument that cannot be used
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage error (Parquet/Arrow encoding or layout)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration could not be assembled
    #[error("Configuration error: {0}")]
    Config(String),

    /// Registry actor task is gone
    #[error("Registry actor closed (task stopped or panicked)")]
    ActorClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
