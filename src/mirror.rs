//! Outbound seam to external stores
//!
//! The versioning core never depends on a database schema. Pipelines that
//! keep a relational copy of version names or row batches plug it in here.

use crate::registry::Version;
use crate::Result;
use arrow::record_batch::RecordBatch;

/// Receives copies of version metadata and row batches.
///
/// Failures are logged by the caller and never roll back the registry.
pub trait VersionMirror: Send + Sync {
    /// Persist version metadata (identifier, name, parent).
    ///
    /// # Errors
    ///
    /// Returns error if the external store rejects the write.
    fn persist_version(&self, version: &Version) -> Result<()>;

    /// Persist a row batch attached to `version_id`.
    ///
    /// # Errors
    ///
    /// Returns error if the external store rejects the write.
    fn persist_rows(&self, version_id: &str, data_kind: &str, rows: &RecordBatch) -> Result<()>;
}

/// Mirror that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMirror;

impl VersionMirror for NullMirror {
    fn persist_version(&self, _version: &Version) -> Result<()> {
        Ok(())
    }

    fn persist_rows(&self, _version_id: &str, _data_kind: &str, _rows: &RecordBatch) -> Result<()> {
        Ok(())
    }
}
