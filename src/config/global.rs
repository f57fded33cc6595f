//! Global configuration management for rtpm.
//!
//! The global configuration file holds user-wide settings that apply to every
//! invocation of the tool, independent of the project in the working directory.
//! Today that is the `[update]` section controlling the self-update engine.
//!
//! # Location
//!
//! - **Unix/macOS**: `~/.rtpm/config.toml`
//! - **Windows**: `%LOCALAPPDATA%\rtpm\config.toml`
//! - **Override**: `RTPM_CONFIG` environment variable, or `--config` on the command line
//!
//! # File Format
//!
//! ```toml
//! [update]
//! auto_update = true
//! check_timeout_ms = 1000
//! strategy = "installer"
//! # Installed a specific version on purpose; suppresses automatic updates
//! # install_version = "1.4.2"
//! ```

use crate::constants::env;
use crate::core::RtpmError;
use crate::update::UpdateConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// User-wide rtpm configuration.
///
/// A missing file is equivalent to [`GlobalConfig::default`].
///
/// # Examples
///
/// ```rust,no_run
/// use rtpm_cli::config::GlobalConfig;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = GlobalConfig::load().await?;
/// println!("auto-update enabled: {}", config.update.auto_update);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GlobalConfig {
    /// Self-update settings.
    #[serde(default, skip_serializing_if = "UpdateConfig::is_default")]
    pub update: UpdateConfig,
}

impl GlobalConfig {
    /// Load from the default location, or `RTPM_CONFIG` when set.
    ///
    /// Returns the default configuration when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` when given, otherwise from [`GlobalConfig::config_path`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::config_path()?,
        };
        if fs::try_exists(&path).await.unwrap_or(false) {
            Self::load_from(&path).await
        } else {
            debug!(path = %path.display(), "No global config, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        toml::from_str(&content)
            .map_err(|e| RtpmError::ConfigError {
                message: format!("{}: {e}", path.display()),
            })
            .with_context(|| format!("Failed to parse global config from {}", path.display()))
    }

    /// Save to `path`, creating parent directories.
    ///
    /// On Unix the file is readable by its owner only.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.with_context(|| {
                format!("Failed to set secure permissions on {}", path.display())
            })?;
        }

        Ok(())
    }

    /// `RTPM_CONFIG` when set, otherwise [`GlobalConfig::default_path`].
    pub fn config_path() -> Result<PathBuf> {
        match std::env::var_os(env::CONFIG) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Self::default_path(),
        }
    }

    /// Platform default location of the global config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or, on Windows, local data) directory
    /// cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("rtpm")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".rtpm")
        };

        Ok(config_dir.join("config.toml"))
    }
}
