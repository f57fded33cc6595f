//! The legacy update generation.
//!
//! Older release infrastructure publishes one JSON document per platform and a
//! bare archive next to it:
//!
//! ```text
//! <base>/<cmd>/<channel>/[<version>/]<platform>.json   {"version", "sha256v2"}
//! <base>/<cmd>/<channel>/<version>/<platform>.tar.gz   (.zip on Windows)
//! ```
//!
//! There is no installer in these archives. The `rtpm` binary is taken out of
//! the archive and swapped with the running one while holding the
//! [`UpdateLock`] of its installation directory, the same lock the current
//! generation takes.

use super::archive::{NativePlatform, PlatformOps};
use super::config::UpdateSettings;
use super::fetcher::Fetcher;
use super::lock::UpdateLock;
use super::model::{Origin, is_sha256_hex};
use super::swap::{BinarySwap, SwapOutcome};
use super::verification::ChecksumVerifier;
use crate::constants::BINARY_NAME;
use crate::core::RtpmError;
use crate::utils::{executable_name, install_dir_from_exe, platform_id};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Version document served by the legacy endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyInfo {
    #[serde(alias = "Version")]
    pub version: String,
    #[serde(alias = "Sha256v2")]
    pub sha256v2: String,
}

/// Result of [`LegacyUpdater::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyOutcome {
    /// The server offers the running version.
    UpToDate,
    Updated {
        version: String,
        swap: SwapOutcome,
    },
}

/// Updates the running binary from the legacy release layout.
pub struct LegacyUpdater<P: PlatformOps = NativePlatform> {
    fetcher: Fetcher<P>,
    base_url: String,
    cmd_name: String,
    channel: String,
    current_version: String,
    desired_version: Option<String>,
    platform: String,
}

impl LegacyUpdater<NativePlatform> {
    pub fn new(settings: &UpdateSettings, origin: &Origin) -> Result<Self> {
        Ok(Self::with_fetcher(Fetcher::new()?, settings, origin))
    }
}

impl<P: PlatformOps + Clone + 'static> LegacyUpdater<P> {
    pub fn with_fetcher(fetcher: Fetcher<P>, settings: &UpdateSettings, origin: &Origin) -> Self {
        Self {
            fetcher,
            base_url: settings.legacy_url.trim_end_matches('/').to_string(),
            cmd_name: BINARY_NAME.to_string(),
            channel: settings.channel.clone().unwrap_or_else(|| origin.channel.clone()),
            current_version: origin.version.clone(),
            desired_version: None,
            platform: platform_id(),
        }
    }

    #[must_use]
    pub fn with_desired_version(mut self, version: Option<String>) -> Self {
        self.desired_version = version.filter(|v| !v.is_empty());
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn info_url(&self) -> String {
        let mut url = format!("{}/{}/{}/", self.base_url, self.cmd_name, self.channel);
        if let Some(version) = &self.desired_version {
            url.push_str(version);
            url.push('/');
        }
        url.push_str(&self.platform);
        url.push_str(".json");
        url
    }

    pub fn archive_url(&self, version: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}{}",
            self.base_url,
            self.cmd_name,
            self.channel,
            version,
            self.platform,
            self.fetcher.platform().archive_extension()
        )
    }

    /// Fetches and validates the version document.
    pub async fn fetch_info(&self) -> Result<LegacyInfo> {
        let url = self.info_url();
        debug!(url = %url, "Fetching legacy update info");

        let body = self.fetcher.download(&url, "legacy update info").await?;
        let info: LegacyInfo =
            serde_json::from_slice(&body).map_err(|e| RtpmError::InvalidUpdateInfo {
                reason: format!("malformed JSON: {e}"),
            })?;

        if info.version.is_empty() {
            return Err(RtpmError::InvalidUpdateInfo {
                reason: "missing version".to_string(),
            }
            .into());
        }
        if !is_sha256_hex(&info.sha256v2) {
            return Err(RtpmError::InvalidUpdateInfo {
                reason: format!("bad archive hash '{}'", info.sha256v2),
            }
            .into());
        }
        Ok(info)
    }

    /// The offered version, unless it is the running one.
    pub async fn available(&self) -> Result<Option<LegacyInfo>> {
        let info = self.fetch_info().await?;
        if info.version == self.current_version {
            debug!(version = %info.version, "Already at the latest legacy version");
            return Ok(None);
        }
        Ok(Some(info))
    }

    /// Downloads the archive for `info`, verifies it and returns the binary inside.
    pub async fn fetch_binary(&self, info: &LegacyInfo) -> Result<Vec<u8>> {
        let url = self.archive_url(&info.version);
        let name = format!("{}{}", self.platform, self.fetcher.platform().archive_extension());

        let archive = self.fetcher.download(&url, &name).await?;
        ChecksumVerifier::verify_checksum(&name, &archive, &info.sha256v2)?;

        let platform = self.fetcher.platform().clone();
        let binary = executable_name(BINARY_NAME);
        tokio::task::spawn_blocking(move || platform.extract_file(&archive, &binary))
            .await
            .context("spawn_blocking panicked")?
    }

    /// Replaces `exe` with the offered version.
    ///
    /// Fails with [`RtpmError::UpdateInProgress`] when another process holds
    /// the lock of the installation `exe` belongs to.
    pub async fn update(&self, exe: &Path) -> Result<LegacyOutcome> {
        let install_dir = install_dir_from_exe(exe)?;

        let Some(lock) = UpdateLock::try_acquire(&install_dir).await? else {
            return Err(RtpmError::UpdateInProgress {
                lock_path: UpdateLock::lock_path(&install_dir).display().to_string(),
            }
            .into());
        };

        let Some(info) = self.available().await? else {
            return Ok(LegacyOutcome::UpToDate);
        };
        info!(version = %info.version, exe = %exe.display(), "Applying legacy update");

        let binary = self.fetch_binary(&info).await?;
        let platform = self.fetcher.platform().clone();
        let target = exe.to_path_buf();
        let swap = tokio::task::spawn_blocking(move || {
            BinarySwap::with_platform(target, platform).replace(&binary)
        })
        .await
        .context("spawn_blocking panicked")??;

        lock.release();
        Ok(LegacyOutcome::Updated {
            version: info.version,
            swap,
        })
    }
}
