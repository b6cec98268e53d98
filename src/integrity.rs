//! Integrity verifier - certify that a version's artifacts are intact
//!
//! Each artifact is reloaded and its canonical hash recomputed with the same
//! procedure used at write time. Per-artifact problems are recorded in the
//! report, never raised; only registry failures abort a check.

use crate::artifact::{canonical, ArtifactDescriptor, ArtifactStore};
use crate::registry::{Version, VersionRegistry};
use crate::{Error, Result};
use serde::Serialize;
use tracing::{info, warn};

/// Outcome for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    /// Recomputed hash matches the registry.
    Valid,
    /// Hash mismatch, or the file no longer decodes.
    Invalid,
    /// File is absent.
    Missing,
}

/// Verification detail for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactCheck {
    /// Artifact file name
    pub filename: String,
    /// Classification
    pub status: ArtifactStatus,
    /// Rows decoded from the file, when readable
    pub rows: Option<usize>,
    /// Hash recorded in the registry
    pub expected_hash: String,
    /// Hash recomputed from the file, when readable
    pub actual_hash: Option<String>,
    /// Why the file could not be checked
    pub error: Option<String>,
}

/// Aggregated integrity result for one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Checked version
    pub version_id: String,
    /// Its human name
    pub version_name: String,
    /// Artifacts examined
    pub files_checked: usize,
    /// Artifacts whose hash matched
    pub files_valid: usize,
    /// Artifacts with a hash mismatch or decode failure
    pub files_invalid: usize,
    /// Artifacts whose file is absent
    pub missing_files: usize,
    /// Per-artifact results in attachment order
    pub details: Vec<ArtifactCheck>,
    /// True only if nothing is invalid or missing
    pub valid: bool,
}

impl VerificationReport {
    fn from_checks(version: &Version, details: Vec<ArtifactCheck>) -> Self {
        let count = |status| details.iter().filter(|d| d.status == status).count();
        let files_valid = count(ArtifactStatus::Valid);
        let files_invalid = count(ArtifactStatus::Invalid);
        let missing_files = count(ArtifactStatus::Missing);

        Self {
            version_id: version.id().to_string(),
            version_name: version.name().to_string(),
            files_checked: details.len(),
            files_valid,
            files_invalid,
            missing_files,
            valid: files_invalid == 0 && missing_files == 0,
            details,
        }
    }

    /// Details that are not [`ArtifactStatus::Valid`].
    pub fn failures(&self) -> impl Iterator<Item = &ArtifactCheck> {
        self.details
            .iter()
            .filter(|d| d.status != ArtifactStatus::Valid)
    }
}

/// Recomputes artifact hashes and cross-checks them against the registry.
#[derive(Debug, Clone, Copy)]
pub struct IntegrityVerifier<'a> {
    registry: &'a VersionRegistry,
    store: &'a ArtifactStore,
}

impl<'a> IntegrityVerifier<'a> {
    /// Create a verifier over a registry and its artifact store.
    #[must_use]
    pub const fn new(registry: &'a VersionRegistry, store: &'a ArtifactStore) -> Self {
        Self { registry, store }
    }

    /// Verify every artifact of `version_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] for an unknown version or
    /// [`Error::RegistryCorrupt`] if the registry cannot be read. Artifact
    /// problems are reported, not returned as errors.
    pub fn check(&self, version_id: &str) -> Result<VerificationReport> {
        let version = self.registry.get(version_id)?;
        Ok(self.check_version(&version))
    }

    /// Verify every active version, in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryCorrupt`] if the registry cannot be read.
    pub fn check_all_active(&self) -> Result<Vec<VerificationReport>> {
        Ok(self
            .registry
            .history()?
            .iter()
            .filter(|v| v.is_active())
            .map(|v| self.check_version(v))
            .collect())
    }

    fn check_version(&self, version: &Version) -> VerificationReport {
        #[cfg(feature = "rayon")]
        let details: Vec<ArtifactCheck> = {
            use rayon::prelude::*;
            version
                .artifacts()
                .par_iter()
                .map(|artifact| self.check_artifact(version.id(), artifact))
                .collect()
        };
        #[cfg(not(feature = "rayon"))]
        let details: Vec<ArtifactCheck> = version
            .artifacts()
            .iter()
            .map(|artifact| self.check_artifact(version.id(), artifact))
            .collect();

        let report = VerificationReport::from_checks(version, details);
        for failure in report.failures() {
            warn!(
                version_id = version.id(),
                filename = %failure.filename,
                status = ?failure.status,
                error = failure.error.as_deref(),
                "artifact failed integrity check"
            );
        }
        info!(
            version_id = version.id(),
            checked = report.files_checked,
            valid = report.valid,
            "verified version integrity"
        );
        report
    }

    fn check_artifact(&self, version_id: &str, artifact: &ArtifactDescriptor) -> ArtifactCheck {
        let mut check = ArtifactCheck {
            filename: artifact.filename().to_string(),
            status: ArtifactStatus::Invalid,
            rows: None,
            expected_hash: artifact.hash().to_string(),
            actual_hash: None,
            error: None,
        };

        let loaded = self
            .store
            .read(version_id, artifact.filename())
            .and_then(|batch| Ok((batch.num_rows(), canonical::content_hash(&batch)?)));

        match loaded {
            Ok((rows, hash)) => {
                check.rows = Some(rows);
                if hash == artifact.hash() {
                    check.status = ArtifactStatus::Valid;
                } else {
                    check.error = Some("Hash mismatch".to_string());
                }
                check.actual_hash = Some(hash);
            }
            Err(Error::ArtifactMissing { .. }) => {
                check.status = ArtifactStatus::Missing;
                check.error = Some("File not found".to_string());
            }
            Err(e) => check.error = Some(e.to_string()),
        }
        check
    }
}
