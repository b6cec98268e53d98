//! Version Record - one immutable snapshot in the lineage forest

use crate::artifact::ArtifactDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar value stored in a version's free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer (counts, sizes).
    Int(i64),
    /// Floating point measurement.
    Float(f64),
    /// Free text.
    Text(String),
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

const fn default_active() -> bool {
    true
}

/// Version Record as stored in the registry document.
///
/// The identifier and parent never change after creation. Artifacts and
/// metadata only grow; the active flag is the one mutable field
/// (soft delete).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    id: String,
    name: String,
    description: Option<String>,
    parent_id: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    artifacts: Vec<ArtifactDescriptor>,
    #[serde(default)]
    metadata: BTreeMap<String, MetadataValue>,
}

impl Version {
    pub(crate) fn new(
        id: String,
        request: NewVersion,
        parent_id: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: request.name,
            description: request.description,
            parent_id,
            created_at,
            active: true,
            artifacts: Vec::new(),
            metadata: request.metadata,
        }
    }

    /// Get the version ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Get the parent version ID, if any.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the version is active (not soft-deleted).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Attached artifacts in attachment order.
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactDescriptor] {
        &self.artifacts
    }

    /// Attached artifacts of one data kind, in attachment order.
    pub fn artifacts_of_kind<'a>(
        &'a self,
        data_kind: &'a str,
    ) -> impl Iterator<Item = &'a ArtifactDescriptor> + 'a {
        self.artifacts
            .iter()
            .filter(move |artifact| artifact.data_kind() == data_kind)
    }

    /// Get the free-form metadata.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, MetadataValue> {
        &self.metadata
    }

    pub(crate) fn push_artifact(&mut self, artifact: ArtifactDescriptor) {
        self.artifacts.push(artifact);
    }

    pub(crate) fn deactivate(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    /// Insert a metadata key; returns `false` if it already existed.
    pub(crate) fn insert_metadata(&mut self, key: String, value: MetadataValue) -> bool {
        match self.metadata.entry(key) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }
}

/// Request to create a version.
///
/// Without an explicit parent the registry chains the new version onto
/// the current latest one.
#[derive(Debug, Clone)]
pub struct NewVersion {
    name: String,
    description: Option<String>,
    parent_id: Option<String>,
    metadata: BTreeMap<String, MetadataValue>,
}

impl NewVersion {
    /// Create a request with only the required name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parent_id: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set an explicit parent (must already be registered).
    #[must_use]
    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Add an initial metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Requested name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicit parent, if any.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}
