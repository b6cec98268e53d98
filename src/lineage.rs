//! Lineage index over the registry's parent pointers
//!
//! Versions form a forest encoded by back-references (each child stores its
//! parent id). The index is an arena of nodes with an id -> slot map;
//! children lists are derived once at build time. Build a fresh index after
//! any `create` (see [`crate::VersionRegistry::lineage`]).
//!
//! Deactivated versions stay in the index: `ancestors` may return ids of
//! soft-deleted versions with no special marking.

use crate::registry::Version;
use crate::{Error, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone)]
struct Node {
    id: String,
    parent: Option<String>,
    children: Vec<usize>,
}

/// Derived parent/child view of a registry snapshot.
#[derive(Debug, Clone, Default)]
pub struct LineageIndex {
    nodes: Vec<Node>,
    slots: FxHashMap<String, usize>,
}

impl LineageIndex {
    /// Build the index from versions in creation order.
    ///
    /// If an id appears twice (hand-edited document) the first occurrence wins.
    #[must_use]
    pub fn from_versions(versions: &[Version]) -> Self {
        let mut index = Self::default();
        for version in versions {
            if index.slots.contains_key(version.id()) {
                continue;
            }
            index
                .slots
                .insert(version.id().to_string(), index.nodes.len());
            index.nodes.push(Node {
                id: version.id().to_string(),
                parent: version.parent_id().map(str::to_string),
                children: Vec::new(),
            });
        }

        for child in 0..index.nodes.len() {
            let parent_slot = index.nodes[child]
                .parent
                .as_deref()
                .and_then(|parent| index.slots.get(parent).copied());
            if let Some(parent_slot) = parent_slot {
                index.nodes[parent_slot].children.push(child);
            }
        }
        index
    }

    /// Number of indexed versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the index has no versions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `version_id` is indexed.
    #[must_use]
    pub fn contains(&self, version_id: &str) -> bool {
        self.slots.contains_key(version_id)
    }

    fn slot(&self, version_id: &str) -> Result<usize> {
        self.slots
            .get(version_id)
            .copied()
            .ok_or_else(|| Error::VersionNotFound(version_id.to_string()))
    }

    /// Recorded parent of a version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] if `version_id` is not indexed.
    pub fn parent(&self, version_id: &str) -> Result<Option<&str>> {
        Ok(self.nodes[self.slot(version_id)?].parent.as_deref())
    }

    /// Ancestor ids from the direct parent up to the root.
    ///
    /// A parent id that is not in the registry ends the walk and is
    /// returned as the last element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] if `version_id` is not indexed and
    /// [`Error::LineageCycle`] if the parent chain loops.
    pub fn ancestors(&self, version_id: &str) -> Result<Vec<String>> {
        let start = self.slot(version_id)?;
        let mut seen = FxHashSet::default();
        seen.insert(start);

        let mut chain = Vec::new();
        let mut next = self.nodes[start].parent.as_deref();
        while let Some(parent_id) = next {
            let Some(&slot) = self.slots.get(parent_id) else {
                warn!(version_id, parent_id, "lineage walk reached a dangling parent");
                chain.push(parent_id.to_string());
                break;
            };
            // At most one hop per version; revisiting a slot means a loop
            if !seen.insert(slot) || chain.len() >= self.nodes.len() {
                return Err(Error::LineageCycle(parent_id.to_string()));
            }
            chain.push(parent_id.to_string());
            next = self.nodes[slot].parent.as_deref();
        }
        Ok(chain)
    }

    /// Direct children, each once, in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] if `version_id` is not indexed.
    pub fn children(&self, version_id: &str) -> Result<Vec<String>> {
        let slot = self.slot(version_id)?;
        Ok(self.nodes[slot]
            .children
            .iter()
            .map(|&child| self.nodes[child].id.clone())
            .collect())
    }

    /// Every transitive descendant, breadth-first, excluding `version_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] if `version_id` is not indexed.
    pub fn descendants(&self, version_id: &str) -> Result<Vec<String>> {
        let start = self.slot(version_id)?;
        let mut seen = FxHashSet::default();
        seen.insert(start);

        let mut queue: VecDeque<usize> = self.nodes[start].children.iter().copied().collect();
        let mut out = Vec::new();
        while let Some(slot) = queue.pop_front() {
            // Cycles only exist in corrupted documents; skip revisits
            if !seen.insert(slot) {
                continue;
            }
            out.push(self.nodes[slot].id.clone());
            queue.extend(self.nodes[slot].children.iter().copied());
        }
        Ok(out)
    }

    /// Versions with no parent, in creation order.
    #[must_use]
    pub fn roots(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|node| node.parent.is_none())
            .map(|node| node.id.clone())
            .collect()
    }
}
