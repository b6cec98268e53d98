//! # data-lineage: Versioned, Hash-Verified Datasets
//!
//! Groups batches of derived data (raw ingests, cleaned records, aggregated
//! statistics) into immutable snapshots ("versions") linked by parent
//! pointers, independently of any system-of-record database.
//!
//! ## Components
//!
//! - **`ArtifactStore`**: one Parquet file per row batch, canonical content hash
//! - **`VersionRegistry`**: JSON registry document, atomic whole-document rewrites
//! - **`LineageIndex`**: parent/child and ancestor traversal over a snapshot
//! - **`IntegrityVerifier`**: recompute hashes, classify valid/invalid/missing
//! - **`VersionReader`**: concatenate a version's artifacts in attachment order
//!
//! ## Single writer
//!
//! The registry document is read, modified and rewritten whole on every
//! mutation. One process must own writes to a given registry; inside a
//! process, share one [`Versioning`] (or a [`registry::RegistryHandle`]).
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use data_lineage::Versioning;
//! use arrow::array::Float64Array;
//! use arrow::record_batch::RecordBatch;
//! use arrow::datatypes::{DataType, Field, Schema};
//! use std::sync::Arc;
//!
//! let versioning = Versioning::builder().root_dir("data/versions").build()?;
//!
//! let schema = Arc::new(Schema::new(vec![Field::new("temp", DataType::Float64, false)]));
//! let rows = RecordBatch::try_new(schema, vec![Arc::new(Float64Array::from(vec![12.5, 13.0]))])?;
//!
//! let version_id = versioning.create_version("hourly ingest", None, None)?;
//! versioning.add_data(&version_id, "processed_weather", &rows)?;
//!
//! assert!(versioning.check(&version_id)?.valid);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod integrity;
pub mod layout;
pub mod lineage;
pub mod mirror;
pub mod reader;
pub mod registry;
pub mod telemetry;

pub use artifact::{ArtifactDescriptor, ArtifactStore};
pub use config::Config;
pub use error::{Error, Result};
pub use integrity::{ArtifactCheck, ArtifactStatus, IntegrityVerifier, VerificationReport};
pub use lineage::LineageIndex;
pub use mirror::{NullMirror, VersionMirror};
pub use reader::VersionReader;
pub use registry::{MetadataValue, NewVersion, RetentionPolicy, Version, VersionRegistry};

use arrow::record_batch::RecordBatch;
use std::path::PathBuf;
use tracing::warn;

/// Versioning instance: one registry, its artifact store and a mirror.
///
/// Construct once at process start and pass it by reference.
pub struct Versioning {
    registry: VersionRegistry,
    store: ArtifactStore,
    mirror: Box<dyn VersionMirror>,
}

impl Versioning {
    /// Create a new versioning builder
    #[must_use]
    pub fn builder() -> VersioningBuilder {
        VersioningBuilder::default()
    }

    /// Open from a loaded [`Config`].
    ///
    /// # Errors
    ///
    /// Returns error if the registry cannot be opened.
    pub fn open(config: &Config) -> Result<Self> {
        Self::builder()
            .root_dir(config.root_dir.clone())
            .registry_file(config.registry_file.clone())
            .build()
    }

    /// The registry.
    #[must_use]
    pub const fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    /// The artifact store.
    #[must_use]
    pub const fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Reader bound to this instance.
    #[must_use]
    pub const fn reader(&self) -> VersionReader<'_> {
        VersionReader::new(&self.registry, &self.store)
    }

    /// Verifier bound to this instance.
    #[must_use]
    pub const fn verifier(&self) -> IntegrityVerifier<'_> {
        IntegrityVerifier::new(&self.registry, &self.store)
    }

    /// Create a version and mirror its metadata.
    ///
    /// # Errors
    ///
    /// See [`VersionRegistry::create_version`].
    pub fn create(&self, request: NewVersion) -> Result<Version> {
        let version = self.registry.create_version(request)?;
        if let Err(e) = self.mirror.persist_version(&version) {
            warn!(version_id = version.id(), error = %e, "failed to mirror version metadata");
        }
        Ok(version)
    }

    /// Create a version from its parts and return the new id.
    ///
    /// # Errors
    ///
    /// See [`VersionRegistry::create`].
    pub fn create_version(
        &self,
        name: &str,
        description: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<String> {
        let mut request = NewVersion::new(name);
        if let Some(description) = description {
            request = request.description(description);
        }
        if let Some(parent_id) = parent_id {
            request = request.parent(parent_id);
        }
        Ok(self.create(request)?.id().to_string())
    }

    /// Store `rows` as a new artifact and attach it to `version_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] before writing anything if the
    /// version is unknown; otherwise see [`ArtifactStore::write`] and
    /// [`VersionRegistry::attach`].
    pub fn add_data(
        &self,
        version_id: &str,
        data_kind: &str,
        rows: &RecordBatch,
    ) -> Result<ArtifactDescriptor> {
        self.registry.get(version_id)?;

        let descriptor = self.store.write(version_id, data_kind, rows)?;
        self.registry.attach(version_id, descriptor.clone())?;

        if let Err(e) = self.mirror.persist_rows(version_id, data_kind, rows) {
            warn!(version_id, data_kind, error = %e, "failed to mirror row batch");
        }
        Ok(descriptor)
    }

    /// See [`VersionReader::load`].
    ///
    /// # Errors
    ///
    /// See [`VersionReader::load`].
    pub fn load(&self, version_id: &str, data_kind: Option<&str>) -> Result<RecordBatch> {
        self.reader().load(version_id, data_kind)
    }

    /// See [`IntegrityVerifier::check`].
    ///
    /// # Errors
    ///
    /// See [`IntegrityVerifier::check`].
    pub fn check(&self, version_id: &str) -> Result<VerificationReport> {
        self.verifier().check(version_id)
    }

    /// See [`IntegrityVerifier::check_all_active`].
    ///
    /// # Errors
    ///
    /// See [`IntegrityVerifier::check_all_active`].
    pub fn check_all_active(&self) -> Result<Vec<VerificationReport>> {
        self.verifier().check_all_active()
    }

    /// See [`VersionRegistry::history`].
    ///
    /// # Errors
    ///
    /// See [`VersionRegistry::history`].
    pub fn history(&self) -> Result<Vec<Version>> {
        self.registry.history()
    }

    /// See [`VersionRegistry::latest`].
    ///
    /// # Errors
    ///
    /// See [`VersionRegistry::latest`].
    pub fn latest(&self) -> Result<Option<String>> {
        self.registry.latest()
    }

    /// See [`VersionRegistry::lineage`].
    ///
    /// # Errors
    ///
    /// See [`VersionRegistry::lineage`].
    pub fn lineage(&self) -> Result<LineageIndex> {
        self.registry.lineage()
    }
}

/// Versioning builder
pub struct VersioningBuilder {
    root_dir: PathBuf,
    registry_file: String,
    mirror: Box<dyn VersionMirror>,
}

impl Default for VersioningBuilder {
    fn default() -> Self {
        let defaults = Config::default();
        Self {
            root_dir: defaults.root_dir,
            registry_file: defaults.registry_file,
            mirror: Box::new(NullMirror),
        }
    }
}

impl VersioningBuilder {
    /// Set the root directory for the registry and version directories
    #[must_use]
    pub fn root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    /// Set the registry document file name
    #[must_use]
    pub fn registry_file(mut self, registry_file: impl Into<String>) -> Self {
        self.registry_file = registry_file.into();
        self
    }

    /// Set the external mirror for version metadata and row batches
    #[must_use]
    pub fn mirror(mut self, mirror: impl VersionMirror + 'static) -> Self {
        self.mirror = Box::new(mirror);
        self
    }

    /// Build the versioning instance
    ///
    /// # Errors
    ///
    /// Returns error if the registry cannot be opened or is corrupt
    pub fn build(self) -> Result<Versioning> {
        let registry = VersionRegistry::open_with_file(&self.root_dir, &self.registry_file)?;
        Ok(Versioning {
            store: ArtifactStore::new(registry.root()),
            registry,
            mirror: self.mirror,
        })
    }
}
