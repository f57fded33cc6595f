//! Artifact model: what is running and what could be installed instead.

use crate::constants::DEFAULT_CHANNEL;
use crate::core::RtpmError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The channel and version of the running binary.
///
/// Built once from build-time constants. An [`AvailableUpdate`] with the same
/// channel and version is the binary already running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub channel: String,
    pub version: String,
}

impl Origin {
    pub fn new(channel: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            version: version.into(),
        }
    }

    /// The origin compiled into this binary.
    ///
    /// The version is the crate version; the channel comes from
    /// `RTPM_BUILD_CHANNEL` at compile time and defaults to `release`.
    #[must_use]
    pub fn current() -> Self {
        Self::new(
            option_env!("RTPM_BUILD_CHANNEL").unwrap_or(DEFAULT_CHANNEL),
            env!("CARGO_PKG_VERSION"),
        )
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.channel, self.version)
    }
}

/// Update info exactly as the info endpoint returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl UpdateInfo {
    /// All fields needed to download and verify the artifact are present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.channel.is_empty()
            && !self.version.is_empty()
            && !self.platform.is_empty()
            && !self.path.is_empty()
            && is_sha256_hex(&self.sha256)
    }
}

/// A concrete artifact that could replace the running binary.
///
/// Only constructed through [`AvailableUpdate::from_info`], which validates the
/// info and derives the download URL from the configured file host. The
/// download URL is never taken from the server response as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableUpdate {
    info: UpdateInfo,
    url: String,
}

impl AvailableUpdate {
    /// Validates `info` and joins its archive path onto `file_base_url`.
    pub fn from_info(info: UpdateInfo, file_base_url: &str) -> Result<Self> {
        if !info.is_valid() {
            return Err(RtpmError::InvalidUpdateInfo {
                reason: format!(
                    "missing or malformed fields (channel={:?}, version={:?}, platform={:?}, path={:?}, sha256={:?})",
                    info.channel, info.version, info.platform, info.path, info.sha256
                ),
            }
            .into());
        }
        if info.path.contains("://") || info.path.starts_with("//") {
            return Err(RtpmError::InvalidUpdateInfo {
                reason: format!("archive path must be relative, got {}", info.path),
            }
            .into());
        }

        let url = format!(
            "{}/{}",
            file_base_url.trim_end_matches('/'),
            info.path.trim_start_matches('/')
        );
        Ok(Self {
            info,
            url,
        })
    }

    pub fn version(&self) -> &str {
        &self.info.version
    }

    pub fn channel(&self) -> &str {
        &self.info.channel
    }

    pub fn platform(&self) -> &str {
        &self.info.platform
    }

    /// Archive path relative to the file host.
    pub fn path(&self) -> &str {
        &self.info.path
    }

    /// Expected SHA-256 of the archive as hex.
    pub fn sha256(&self) -> &str {
        &self.info.sha256
    }

    /// Opaque rollout tag passed on to the installer.
    pub fn tag(&self) -> Option<&str> {
        self.info.tag.as_deref()
    }

    /// Absolute download URL of the archive.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Last path segment of the archive, used in messages.
    pub fn archive_name(&self) -> &str {
        self.info.path.rsplit('/').next().unwrap_or(&self.info.path)
    }

    /// Same channel and version as `origin`.
    #[must_use]
    pub fn is_equivalent_to(&self, origin: &Origin) -> bool {
        self.info.channel == origin.channel && self.info.version == origin.version
    }
}

impl fmt::Display for AvailableUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.info.channel, self.info.version, self.info.platform)
    }
}

pub(crate) fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}
