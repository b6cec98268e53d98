//! Registry document - the durable root, rewritten whole on every mutation

use super::Version;
use crate::layout;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Full registry state: every version in creation order plus the latest pointer.
///
/// Lookups are linear scans; there is no secondary index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    versions: Vec<Version>,
    latest_version: Option<String>,
    created_at: DateTime<Utc>,
}

impl RegistryDocument {
    /// Create an empty document stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            versions: Vec::new(),
            latest_version: None,
            created_at: Utc::now(),
        }
    }

    /// Versions in creation order.
    #[must_use]
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Consume the document, yielding its versions.
    #[must_use]
    pub fn into_versions(self) -> Vec<Version> {
        self.versions
    }

    /// Latest pointer (advanced on create only).
    #[must_use]
    pub fn latest_version(&self) -> Option<&str> {
        self.latest_version.as_deref()
    }

    /// When the registry itself was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Linear lookup by identifier.
    #[must_use]
    pub fn find(&self, version_id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id() == version_id)
    }

    pub(crate) fn find_mut(&mut self, version_id: &str) -> Option<&mut Version> {
        self.versions.iter_mut().find(|v| v.id() == version_id)
    }

    pub(crate) fn versions_mut(&mut self) -> &mut [Version] {
        &mut self.versions
    }

    /// Append a version and move the latest pointer to it.
    pub(crate) fn push(&mut self, version: Version) {
        self.latest_version = Some(version.id().to_string());
        self.versions.push(version);
    }

    /// Read and parse the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::RegistryCorrupt`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| Error::RegistryCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Replace the document at `path` atomically (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns error if the temporary file cannot be written or renamed.
    pub fn save(&self, path: &Path) -> Result<()> {
        layout::write_json_atomic(path, self)
    }
}

impl Default for RegistryDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NewVersion;

    #[test]
    fn test_push_moves_latest() {
        let mut doc = RegistryDocument::new();
        doc.push(Version::new("a".into(), NewVersion::new("a"), None, Utc::now()));
        doc.push(Version::new("b".into(), NewVersion::new("b"), None, Utc::now()));

        assert_eq!(doc.latest_version(), Some("b"));
        assert_eq!(doc.versions().len(), 2);
        assert!(doc.find("a").is_some());
        assert!(doc.find("zzz").is_none());
    }

    #[test]
    fn test_save_load_preserves_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let mut doc = RegistryDocument::new();
        doc.push(Version::new("a".into(), NewVersion::new("a"), None, Utc::now()));
        doc.save(&path).unwrap();

        assert_eq!(RegistryDocument::load(&path).unwrap(), doc);
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = RegistryDocument::load(&path).unwrap_err();
        assert!(matches!(err, Error::RegistryCorrupt { .. }));
    }

    #[test]
    fn test_document_is_human_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        RegistryDocument::new().save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"versions\": []"));
        assert!(text.contains("\"latest_version\": null"));
    }
}
