//! Artifact Descriptor - registry entry for one stored row batch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Artifact Descriptor describes one artifact file attached to a version.
///
/// The `hash` is a content hash over the canonical row serialization
/// (see [`crate::artifact::canonical`]), not over the Parquet bytes, so it
/// can be recomputed from any faithful decoding of the file.
///
/// ## Hash Format
///
/// Lower-case hex SHA-256 digest, 64 characters:
/// `e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    filename: String,
    data_kind: String,
    created_at: DateTime<Utc>,
    rows: usize,
    columns: Vec<String>,
    hash: String,
}

impl ArtifactDescriptor {
    /// Create a new artifact descriptor.
    ///
    /// # Arguments
    ///
    /// * `filename` - File name inside the version directory
    /// * `data_kind` - Content classification (e.g., "processed_weather")
    /// * `rows` - Number of rows stored
    /// * `columns` - Column names in schema order
    /// * `hash` - Hex content hash of the canonical serialization
    ///
    /// # Returns
    ///
    /// A new `ArtifactDescriptor` with the current timestamp.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        data_kind: impl Into<String>,
        rows: usize,
        columns: Vec<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            data_kind: data_kind.into(),
            created_at: Utc::now(),
            rows,
            columns,
            hash: hash.into(),
        }
    }

    /// Get the file name (unique within its version).
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Get the data-kind tag.
    #[must_use]
    pub fn data_kind(&self) -> &str {
        &self.data_kind
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the stored row count.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Get the column names in schema order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get the recorded content hash.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}
