//! Configuration
//!
//! Layered with `figment`: built-in defaults -> optional TOML file ->
//! environment variables prefixed `LINEAGE_` (e.g. `LINEAGE_ROOT_DIR`).

use crate::layout::{self, REGISTRY_FILE};
use crate::Result;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "LINEAGE_";

/// Versioning configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the registry document and per-version directories
    pub root_dir: PathBuf,
    /// Registry document file name inside `root_dir`
    pub registry_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("data/versions"),
            registry_file: REGISTRY_FILE.to_string(),
        }
    }
}

impl Config {
    /// Load defaults, then `file` if given and present, then the environment.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if a source is malformed or the
    /// result fails validation.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file.filter(|f| f.exists()) {
            figment = figment.merge(Toml::file(file));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));
        Self::from_figment(&figment)
    }

    /// Extract and validate from an assembled figment.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] on extraction or validation failure.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Config rooted at `root_dir` with the default registry file.
    #[must_use]
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Full path of the registry document.
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.root_dir.join(&self.registry_file)
    }

    fn validate(&self) -> Result<()> {
        layout::ensure_path_component("registry file", &self.registry_file)
            .map_err(|e| crate::Error::Config(e.to_string()))
    }
}
