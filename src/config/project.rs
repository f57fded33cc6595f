//! Project configuration (`rtpm.toml`).
//!
//! Only the `[tool]` table matters here: a project can pin the rtpm version it
//! was written for, which turns off automatic updates inside that project.
//!
//! ```toml
//! [tool]
//! version = "1.4.2"
//! ```

use crate::constants::PROJECT_CONFIG_FILE;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The parts of `rtpm.toml` the CLI itself reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub tool: ToolSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ToolSection {
    /// Pinned rtpm version.
    pub version: Option<String>,
}

impl ProjectConfig {
    /// Parses the project file at `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read project config: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse project config: {}", path.display()))
    }

    /// Finds the nearest `rtpm.toml` in `start` or one of its ancestors.
    pub fn find_path(start: &Path) -> Option<PathBuf> {
        start.ancestors().map(|dir| dir.join(PROJECT_CONFIG_FILE)).find(|path| path.is_file())
    }

    /// Loads the nearest project file, if there is one.
    pub fn find(start: &Path) -> Result<Option<(PathBuf, Self)>> {
        match Self::find_path(start) {
            Some(path) => {
                let config = Self::load_from(&path)?;
                Ok(Some((path, config)))
            }
            None => Ok(None),
        }
    }

    /// The version pinned by the project around `start`.
    ///
    /// An unreadable project file pins nothing; the problem is logged.
    pub fn pinned_version(start: &Path) -> Option<String> {
        match Self::find(start) {
            Ok(Some((path, config))) => {
                let version = config.tool.version.filter(|v| !v.trim().is_empty());
                if let Some(version) = &version {
                    debug!(project = %path.display(), version, "Project pins rtpm version");
                }
                version
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Ignoring unreadable project config");
                None
            }
        }
    }
}
