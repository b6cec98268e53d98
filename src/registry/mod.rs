//! Version registry - source of truth for versions and the latest pointer
//!
//! ## Write model
//!
//! Every mutation is read-entire-document, modify in memory, write-entire-
//! document (temp file + atomic rename). A `VersionRegistry` serializes its
//! own mutators behind a mutex, but there is no cross-process lock: two
//! processes mutating the same document race and the last writer wins.
//! Run a single writer per registry, or route all writes through
//! [`RegistryActor`] inside one process.
//!
//! Reads (`history`, `latest`, `get`) take a fresh snapshot of the document
//! and never block writers.
//!
//! ```text
//! version_registry.json
//!   versions: [Version (1) ──< ArtifactDescriptor (N)]
//!   latest_version
//!   created_at
//! ```

#[cfg(feature = "tokio")]
mod actor;
mod document;
mod version;

#[cfg(feature = "tokio")]
pub use actor::{RegistryActor, RegistryHandle};
pub use document::RegistryDocument;
pub use version::{MetadataValue, NewVersion, Version};

use crate::artifact::ArtifactDescriptor;
use crate::layout::{self, REGISTRY_FILE, VERSION_INFO_FILE};
use crate::lineage::LineageIndex;
use crate::{Error, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Retention rule for soft-deleting old versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep the `n` most recently created active versions.
    KeepLast(usize),
    /// Keep active versions younger than the given age.
    MaxAge(chrono::Duration),
}

/// Handle to one registry document and its per-version directories.
///
/// Construct once at process start and pass it to collaborators.
#[derive(Debug)]
pub struct VersionRegistry {
    root: PathBuf,
    path: PathBuf,
    writer: Mutex<()>,
}

impl VersionRegistry {
    /// Open the registry under `root`, creating an empty document if absent.
    ///
    /// # Errors
    ///
    /// Returns error if the root cannot be created or an existing document
    /// is unreadable.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_file(root, REGISTRY_FILE)
    }

    /// Open with a custom document file name inside `root`.
    ///
    /// # Errors
    ///
    /// Returns error if the file name is not a bare name, the root cannot be
    /// created, or an existing document is unreadable.
    pub fn open_with_file(root: impl AsRef<Path>, file_name: &str) -> Result<Self> {
        layout::ensure_path_component("registry file", file_name)?;
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;

        let registry = Self {
            path: root.join(file_name),
            root,
            writer: Mutex::new(()),
        };

        if registry.path.exists() {
            // Fail fast on a corrupt document
            RegistryDocument::load(&registry.path)?;
        } else {
            RegistryDocument::new().save(&registry.path)?;
            info!(path = %registry.path.display(), "initialized empty version registry");
        }
        Ok(registry)
    }

    /// Versioning root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the registry document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fresh snapshot of the whole document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryCorrupt`] if the document does not parse.
    pub fn snapshot(&self) -> Result<RegistryDocument> {
        RegistryDocument::load(&self.path)
    }

    /// Run `f` against a freshly loaded document and persist the result.
    ///
    /// Nothing is written when `f` fails.
    fn mutate<T>(&self, f: impl FnOnce(&mut RegistryDocument) -> Result<T>) -> Result<T> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut doc = RegistryDocument::load(&self.path)?;
        let out = f(&mut doc)?;
        doc.save(&self.path)?;
        Ok(out)
    }

    /// Refresh the per-version copy of `version`.
    ///
    /// Runs after the registry document is committed, so a failure here is
    /// logged and never reported as a failed mutation.
    fn refresh_version_info(&self, version: &Version) {
        let dir = layout::version_dir(&self.root, version.id());
        let written = std::fs::create_dir_all(&dir)
            .map_err(Error::from)
            .and_then(|()| layout::write_json_atomic(&dir.join(VERSION_INFO_FILE), version));
        if let Err(e) = written {
            warn!(
                version_id = version.id(),
                error = %e,
                "failed to refresh version_info.json; registry document is authoritative"
            );
        }
    }

    /// Create a version and return its identifier.
    ///
    /// Without `parent_id`, the current latest version (if any) becomes
    /// the parent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParentNotFound`] for an unknown explicit parent and
    /// [`Error::RegistryCorrupt`] if the document does not parse.
    pub fn create(
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
        Ok(self.create_version(request)?.id().to_string())
    }

    /// Create a version from a full request and return the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank name,
    /// [`Error::ParentNotFound`] for an unknown explicit parent and
    /// [`Error::RegistryCorrupt`] if the document does not parse.
    pub fn create_version(&self, request: NewVersion) -> Result<Version> {
        if request.name().trim().is_empty() {
            return Err(Error::InvalidInput("version name must not be blank".into()));
        }

        let version = self.mutate(|doc| {
            let parent_id = match request.parent_id() {
                Some(explicit) => {
                    if doc.find(explicit).is_none() {
                        return Err(Error::ParentNotFound(explicit.to_string()));
                    }
                    Some(explicit.to_string())
                }
                None if doc.versions().is_empty() => None,
                None => doc.latest_version().map(str::to_string),
            };

            // Creation times never run backwards along the version list
            let now = Utc::now();
            let created_at = doc
                .versions()
                .last()
                .map_or(now, |last| last.created_at().max(now));

            let version = Version::new(Uuid::new_v4().to_string(), request, parent_id, created_at);
            doc.push(version.clone());
            Ok(version)
        })?;

        self.refresh_version_info(&version);
        info!(
            version_id = version.id(),
            name = version.name(),
            parent_id = version.parent_id(),
            "created data version"
        );
        Ok(version)
    }

    /// Append an artifact descriptor to a version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] for an unknown version and
    /// [`Error::InvalidInput`] if the filename is already attached.
    pub fn attach(&self, version_id: &str, artifact: ArtifactDescriptor) -> Result<()> {
        let filename = artifact.filename().to_string();
        let version = self.mutate(|doc| {
            let version = doc
                .find_mut(version_id)
                .ok_or_else(|| Error::VersionNotFound(version_id.to_string()))?;
            if version.artifacts().iter().any(|a| a.filename() == filename) {
                return Err(Error::InvalidInput(format!(
                    "artifact {filename} is already attached to version {version_id}"
                )));
            }
            version.push_artifact(artifact);
            Ok(version.clone())
        })?;

        self.refresh_version_info(&version);
        info!(version_id, filename = %filename, "attached artifact to version");
        Ok(())
    }

    /// Soft-delete a version. Data and descriptors are kept; the latest
    /// pointer is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] for an unknown version.
    pub fn deactivate(&self, version_id: &str) -> Result<()> {
        let (version, was_active) = self.mutate(|doc| {
            let version = doc
                .find_mut(version_id)
                .ok_or_else(|| Error::VersionNotFound(version_id.to_string()))?;
            let was_active = version.deactivate();
            Ok((version.clone(), was_active))
        })?;

        self.refresh_version_info(&version);
        if was_active {
            info!(version_id, "deactivated data version");
        } else {
            debug!(version_id, "version already inactive");
        }
        Ok(())
    }

    /// Add a metadata entry to a version. Existing keys are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] for an unknown version and
    /// [`Error::InvalidInput`] if the key is already present.
    pub fn annotate(
        &self,
        version_id: &str,
        key: &str,
        value: impl Into<MetadataValue>,
    ) -> Result<()> {
        let value = value.into();
        let version = self.mutate(|doc| {
            let version = doc
                .find_mut(version_id)
                .ok_or_else(|| Error::VersionNotFound(version_id.to_string()))?;
            if !version.insert_metadata(key.to_string(), value) {
                return Err(Error::InvalidInput(format!(
                    "metadata key {key:?} already set on version {version_id}"
                )));
            }
            Ok(version.clone())
        })?;

        self.refresh_version_info(&version);
        Ok(())
    }

    /// Deactivate versions according to `policy`; returns the ids that
    /// changed, in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryCorrupt`] if the document does not parse.
    pub fn apply_retention(&self, policy: RetentionPolicy) -> Result<Vec<String>> {
        let changed = self.mutate(|doc| {
            let active = doc.versions().iter().filter(|v| v.is_active()).count();
            let mut surplus = match policy {
                RetentionPolicy::KeepLast(keep) => active.saturating_sub(keep),
                RetentionPolicy::MaxAge(_) => 0,
            };
            // An age reaching past the representable range expires nothing
            let cutoff = match policy {
                RetentionPolicy::MaxAge(age) => Utc::now().checked_sub_signed(age),
                RetentionPolicy::KeepLast(_) => None,
            };

            let mut changed = Vec::new();
            for version in doc.versions_mut().iter_mut().filter(|v| v.is_active()) {
                let expire = match policy {
                    RetentionPolicy::MaxAge(_) => {
                        cutoff.is_some_and(|cutoff| version.created_at() < cutoff)
                    }
                    RetentionPolicy::KeepLast(_) if surplus > 0 => {
                        surplus -= 1;
                        true
                    }
                    RetentionPolicy::KeepLast(_) => false,
                };
                if expire {
                    version.deactivate();
                    changed.push(version.clone());
                }
            }
            Ok(changed)
        })?;

        for version in &changed {
            self.refresh_version_info(version);
        }
        info!(?policy, deactivated = changed.len(), "applied retention policy");
        Ok(changed.into_iter().map(|v| v.id().to_string()).collect())
    }

    /// Latest pointer, regardless of the active flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryCorrupt`] if the document does not parse.
    pub fn latest(&self) -> Result<Option<String>> {
        Ok(self.snapshot()?.latest_version().map(str::to_string))
    }

    /// Most recently created version that is still active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryCorrupt`] if the document does not parse.
    pub fn latest_active(&self) -> Result<Option<String>> {
        Ok(self
            .snapshot()?
            .versions()
            .iter()
            .rev()
            .find(|v| v.is_active())
            .map(|v| v.id().to_string()))
    }

    /// All versions in creation order (fresh read on every call).
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryCorrupt`] if the document does not parse.
    pub fn history(&self) -> Result<Vec<Version>> {
        Ok(self.snapshot()?.into_versions())
    }

    /// Look up one version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] for an unknown version.
    pub fn get(&self, version_id: &str) -> Result<Version> {
        self.snapshot()?
            .find(version_id)
            .cloned()
            .ok_or_else(|| Error::VersionNotFound(version_id.to_string()))
    }

    /// Lineage index over a fresh snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryCorrupt`] if the document does not parse.
    pub fn lineage(&self) -> Result<LineageIndex> {
        Ok(LineageIndex::from_versions(self.snapshot()?.versions()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, VersionRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = VersionRegistry::open(dir.path()).unwrap();
        (dir, registry)
    }

    #[test]
    fn test_open_initializes_document() {
        let (dir, registry) = open_temp();
        assert!(dir.path().join(REGISTRY_FILE).exists());
        assert!(registry.history().unwrap().is_empty());
        assert_eq!(registry.latest().unwrap(), None);
    }

    #[test]
    fn test_reopen_keeps_versions() {
        let (dir, registry) = open_temp();
        let id = registry.create("first", None, None).unwrap();
        drop(registry);

        let reopened = VersionRegistry::open(dir.path()).unwrap();
        assert_eq!(reopened.latest().unwrap(), Some(id));
    }

    #[test]
    fn test_open_corrupt_document_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(REGISTRY_FILE), "[1, 2").unwrap();

        let err = VersionRegistry::open(dir.path()).unwrap_err();
        assert!(matches!(err, Error::RegistryCorrupt { .. }));
    }

    #[test]
    fn test_open_with_nested_file_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VersionRegistry::open_with_file(dir.path(), "../r.json").is_err());
    }

    #[test]
    fn test_create_writes_version_info() {
        let (dir, registry) = open_temp();
        let id = registry.create("first", Some("desc"), None).unwrap();

        let info = dir.path().join(&id).join(VERSION_INFO_FILE);
        let copy: Version = serde_json::from_str(&std::fs::read_to_string(info).unwrap()).unwrap();
        assert_eq!(copy, registry.get(&id).unwrap());
    }

    #[test]
    fn test_blank_name_rejected() {
        let (_dir, registry) = open_temp();
        assert!(matches!(
            registry.create("  ", None, None),
            Err(Error::InvalidInput(_))
        ));
        assert!(registry.history().unwrap().is_empty());
    }

    #[test]
    fn test_created_at_is_monotonic() {
        let (_dir, registry) = open_temp();
        for i in 0..5 {
            registry.create(&format!("v{i}"), None, None).unwrap();
        }
        let history = registry.history().unwrap();
        assert!(history
            .windows(2)
            .all(|pair| pair[0].created_at() <= pair[1].created_at()));
    }

    #[test]
    fn test_attach_duplicate_filename_rejected() {
        let (_dir, registry) = open_temp();
        let id = registry.create("v", None, None).unwrap();
        let artifact = ArtifactDescriptor::new("a.parquet", "raw", 1, vec![], "00");

        registry.attach(&id, artifact.clone()).unwrap();
        assert!(matches!(
            registry.attach(&id, artifact),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(registry.get(&id).unwrap().artifacts().len(), 1);
    }

    #[test]
    fn test_annotate_append_only() {
        let (_dir, registry) = open_temp();
        let id = registry.create("v", None, None).unwrap();

        registry.annotate(&id, "rows", 10_i64).unwrap();
        assert!(registry.annotate(&id, "rows", 11_i64).is_err());
        assert_eq!(
            registry.get(&id).unwrap().metadata()["rows"],
            MetadataValue::Int(10)
        );
    }

    #[test]
    fn test_retention_keep_last() {
        let (_dir, registry) = open_temp();
        let ids: Vec<_> = (0..5)
            .map(|i| registry.create(&format!("v{i}"), None, None).unwrap())
            .collect();

        let changed = registry.apply_retention(RetentionPolicy::KeepLast(2)).unwrap();
        assert_eq!(changed, ids[..3]);

        let active: Vec<_> = registry
            .history()
            .unwrap()
            .into_iter()
            .filter(Version::is_active)
            .map(|v| v.id().to_string())
            .collect();
        assert_eq!(active, ids[3..]);
        assert_eq!(registry.history().unwrap().len(), 5);
    }

    #[test]
    fn test_retention_max_age() {
        let (_dir, registry) = open_temp();
        registry.create("fresh", None, None).unwrap();

        let none = registry
            .apply_retention(RetentionPolicy::MaxAge(chrono::Duration::days(30)))
            .unwrap();
        assert!(none.is_empty());

        let all = registry
            .apply_retention(RetentionPolicy::MaxAge(chrono::Duration::seconds(-60)))
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_version_info_failure_does_not_fail_committed_mutation() {
        let (dir, registry) = open_temp();
        let id = registry.create("v", None, None).unwrap();

        // A plain file where the version directory should be
        let version_dir = dir.path().join(&id);
        std::fs::remove_dir_all(&version_dir).unwrap();
        std::fs::write(&version_dir, b"not a directory").unwrap();

        let artifact = ArtifactDescriptor::new(
            "a.parquet",
            "processed",
            1,
            vec!["temp".to_string()],
            "ab".repeat(32),
        );
        registry.attach(&id, artifact).unwrap();
        registry.deactivate(&id).unwrap();

        let stored = registry.get(&id).unwrap();
        assert_eq!(stored.artifacts().len(), 1);
        assert!(!stored.is_active());
        assert_eq!(registry.history().unwrap().len(), 1);
    }

    #[test]
    fn test_retention_unbounded_max_age_keeps_everything() {
        let (_dir, registry) = open_temp();
        let id = registry.create("kept", None, None).unwrap();

        let changed = registry
            .apply_retention(RetentionPolicy::MaxAge(chrono::Duration::MAX))
            .unwrap();

        assert!(changed.is_empty());
        assert!(registry.get(&id).unwrap().is_active());
        // The writer lock is still usable afterwards
        registry.create("next", None, None).unwrap();
    }

    #[test]
    fn test_latest_active_skips_deactivated() {
        let (_dir, registry) = open_temp();
        let a = registry.create("a", None, None).unwrap();
        let b = registry.create("b", None, None).unwrap();

        registry.deactivate(&b).unwrap();

        assert_eq!(registry.latest().unwrap(), Some(b));
        assert_eq!(registry.latest_active().unwrap(), Some(a));
    }
}
