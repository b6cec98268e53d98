//! Artifact store (Arrow/Parquet)
//!
//! One immutable Parquet file per `write` call, named from the data kind and
//! a timestamp, inside the version's directory. The store never touches the
//! registry: callers attach the returned descriptor themselves.
//!
//! The final name is claimed with an exclusive create, then the data goes to
//! a hidden temporary file that is renamed over the claim. A crash leaves at
//! most an empty placeholder under the final name, never a truncated artifact.

pub mod canonical;
mod descriptor;

pub use descriptor::ArtifactDescriptor;

use crate::layout::{self, ARTIFACT_EXTENSION};
use crate::{Error, Result};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Stores row batches as Parquet artifacts under a versioning root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root` (the same root as the registry).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Versioning root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of an artifact file.
    ///
    /// # Errors
    ///
    /// Returns error if either component would escape the version directory.
    pub fn artifact_path(&self, version_id: &str, filename: &str) -> Result<PathBuf> {
        layout::ensure_path_component("version id", version_id)?;
        layout::ensure_path_component("artifact filename", filename)?;
        Ok(layout::version_dir(&self.root, version_id).join(filename))
    }

    /// Persist `rows` as a new artifact of `version_id`.
    ///
    /// The content hash is computed over the canonical row serialization,
    /// never over the Parquet bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the data kind is not filename-safe, a column type has
    /// no canonical encoding, or the file cannot be written.
    pub fn write(
        &self,
        version_id: &str,
        data_kind: &str,
        rows: &RecordBatch,
    ) -> Result<ArtifactDescriptor> {
        layout::ensure_path_component("version id", version_id)?;
        layout::ensure_data_kind(data_kind)?;

        // Hash first: an unsupported column type must not leave a file behind
        let hash = canonical::content_hash(rows)?;

        let dir = layout::version_dir(&self.root, version_id);
        std::fs::create_dir_all(&dir)?;

        // The reservation makes both the final name and its temp file ours alone
        let filename = reserve_filename(&dir, data_kind, Utc::now())?;
        let path = dir.join(&filename);
        let tmp = dir.join(format!(".{filename}.tmp"));

        let written = write_parquet(&tmp, rows).and_then(|()| Ok(std::fs::rename(&tmp, &path)?));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }
        debug!(path = %path.display(), %hash, "artifact file written");

        let columns = rows
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect();
        let descriptor =
            ArtifactDescriptor::new(filename, data_kind, rows.num_rows(), columns, hash);

        info!(
            version_id,
            filename = descriptor.filename(),
            rows = descriptor.rows(),
            "stored artifact"
        );
        Ok(descriptor)
    }

    /// Load one artifact file back into a single record batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArtifactMissing`] if the file does not exist, or a
    /// storage error if it cannot be decoded.
    pub fn read(&self, version_id: &str, filename: &str) -> Result<RecordBatch> {
        let path = self.artifact_path(version_id, filename)?;
        if !path.is_file() {
            return Err(Error::ArtifactMissing {
                version_id: version_id.to_string(),
                filename: filename.to_string(),
            });
        }

        let file = File::open(&path)
            .map_err(|e| Error::StorageError(format!("Failed to open Parquet file: {e}")))?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;
        let schema = builder.schema().clone();

        let reader = builder
            .build()
            .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch
                .map_err(|e| Error::StorageError(format!("Failed to read record batch: {e}")))?;
            batches.push(batch);
        }

        Ok(arrow::compute::concat_batches(&schema, &batches)?)
    }

    /// Whether the artifact file is present.
    #[must_use]
    pub fn exists(&self, version_id: &str, filename: &str) -> bool {
        self.artifact_path(version_id, filename)
            .is_ok_and(|path| path.is_file())
    }
}

fn write_parquet(path: &Path, rows: &RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, rows.schema(), None)?;
    writer.write(rows)?;
    let file = writer.into_inner()?;
    file.sync_all()?;
    Ok(())
}

/// Claim `<kind>_<YYYYmmdd_HHMMSS_ffffff>.parquet` in `dir`, appending `_N`
/// until an exclusive create succeeds. The empty placeholder is replaced by
/// the rename of the finished file.
fn reserve_filename(dir: &Path, data_kind: &str, at: DateTime<Utc>) -> Result<String> {
    let stem = format!("{data_kind}_{}", at.format("%Y%m%d_%H%M%S_%6f"));
    let mut suffix = 0u32;
    loop {
        let candidate = if suffix == 0 {
            format!("{stem}.{ARTIFACT_EXTENSION}")
        } else {
            format!("{stem}_{suffix}.{ARTIFACT_EXTENSION}")
        };
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&candidate))
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}
