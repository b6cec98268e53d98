//! On-disk layout of a versioning root
//!
//! ```text
//! <root>/
//!   version_registry.json
//!   <version_id>/
//!     version_info.json
//!     <data_kind>_<YYYYmmdd_HHMMSS_ffffff>.parquet
//! ```

use crate::{Error, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default registry document name inside the root directory
pub const REGISTRY_FILE: &str = "version_registry.json";

/// Per-version copy of the version record
pub const VERSION_INFO_FILE: &str = "version_info.json";

/// Extension of artifact files
pub const ARTIFACT_EXTENSION: &str = "parquet";

/// Directory holding one version's metadata copy and artifacts.
#[must_use]
pub fn version_dir(root: &Path, version_id: &str) -> PathBuf {
    root.join(version_id)
}

/// Reject identifiers that would escape the root when used as a path component.
pub(crate) fn ensure_path_component(kind: &str, value: &str) -> Result<()> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.contains('\0');
    if bad {
        return Err(Error::InvalidInput(format!(
            "{kind} {value:?} is not a valid path component"
        )));
    }
    Ok(())
}

/// Data kinds become file name prefixes: ASCII alphanumerics, `-` and `_` only.
pub(crate) fn ensure_data_kind(data_kind: &str) -> Result<()> {
    let valid = !data_kind.is_empty()
        && data_kind
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "data kind {data_kind:?} must be non-empty and use only [A-Za-z0-9_-]"
        )))
    }
}

/// Write `bytes` to `<path>.tmp`, fsync, then rename over `path`.
///
/// Readers see either the previous file or the new one, never a torn write.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Pretty-printed JSON through [`write_atomic`].
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value)
        .map_err(|e| Error::Other(format!("Failed to serialize {}: {e}", path.display())))?;
    write_atomic(path, &content)
}
