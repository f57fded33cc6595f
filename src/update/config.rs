//! Update settings.
//!
//! Three layers decide how the engine behaves: the `[update]` table of the
//! global config, a snapshot of `RTPM_*` environment variables taken once at
//! startup, and built-in defaults. [`UpdateSettings::resolve`] merges them with
//! the environment winning over the config file.

use crate::constants::{
    DEFAULT_CACHE_REFRESH_INTERVAL, DEFAULT_CHECK_TIMEOUT, DEFAULT_FILE_URL, DEFAULT_INFO_URL,
    DEFAULT_LEGACY_URL, env,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How an update replaces the running installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallStrategy {
    /// Hand the unpacked bundle to `rtpm-installer`.
    #[default]
    Installer,
    /// Swap the binary next to the running one.
    InPlace,
}

/// Self-update settings from the `[update]` table of the global config.
///
/// # TOML Example
/// ```toml
/// [update]
/// auto_update = true
/// check_timeout_ms = 1000
/// cache_refresh_interval = 1800
/// strategy = "installer"
/// rollout_tag = "canary"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Install updates automatically at startup. When false an available
    /// update is only announced.
    #[serde(default = "default_auto_update")]
    pub auto_update: bool,

    /// Upper bound in milliseconds for the startup check.
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,

    /// Seconds between background refreshes of the update cache.
    #[serde(default = "default_cache_refresh_interval")]
    pub cache_refresh_interval: u64,

    #[serde(default)]
    pub strategy: InstallStrategy,

    /// Opaque rollout tag sent with every info request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_tag: Option<String>,

    /// Set when a specific version was installed on purpose; disables
    /// automatic updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_version: Option<String>,

    /// Channel to follow instead of the one the binary was built for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_url: Option<String>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            auto_update: default_auto_update(),
            check_timeout_ms: default_check_timeout_ms(),
            cache_refresh_interval: default_cache_refresh_interval(),
            strategy: InstallStrategy::default(),
            rollout_tag: None,
            install_version: None,
            channel: None,
            info_url: None,
            file_url: None,
            legacy_url: None,
        }
    }
}

const fn default_auto_update() -> bool {
    true
}

const fn default_check_timeout_ms() -> u64 {
    DEFAULT_CHECK_TIMEOUT.as_millis() as u64
}

const fn default_cache_refresh_interval() -> u64 {
    DEFAULT_CACHE_REFRESH_INTERVAL.as_secs()
}

impl UpdateConfig {
    /// Whether every field still has its default value.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Snapshot of the environment variables that steer the update engine.
///
/// Captured once so decisions are made against a consistent view and tests
/// can build one without touching the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub info_url: Option<String>,
    pub file_url: Option<String>,
    pub legacy_url: Option<String>,
    pub channel: Option<String>,
    pub timeout_ms: Option<u64>,
    /// Raw value of `RTPM_DISABLE_UPDATES`.
    pub disable_updates: Option<String>,
    pub force_update: bool,
    pub test_auto_update: bool,
    pub forwarded: bool,
    pub testing: bool,
    pub ci: bool,
}

impl EnvOverrides {
    /// Reads the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds overrides from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let is_true = |key: &str| lookup(key).is_some_and(|value| value == "true");

        Self {
            info_url: non_empty(env::UPDATE_INFO_URL),
            file_url: non_empty(env::UPDATE_URL),
            legacy_url: non_empty(env::LEGACY_UPDATE_URL),
            channel: non_empty(env::UPDATE_CHANNEL),
            timeout_ms: non_empty(env::UPDATE_TIMEOUT_MS).and_then(|value| value.parse().ok()),
            disable_updates: lookup(env::DISABLE_UPDATES),
            force_update: is_true(env::FORCE_UPDATE),
            test_auto_update: is_true(env::TEST_AUTO_UPDATE),
            forwarded: is_true(env::FORWARDED),
            testing: lookup(env::TESTING).is_some(),
            ci: env::CI_MARKERS.iter().any(|key| non_empty(key).is_some()),
        }
    }

    /// `RTPM_DISABLE_UPDATES=true`.
    #[must_use]
    pub fn updates_disabled(&self) -> bool {
        self.disable_updates.as_deref() == Some("true")
    }

    /// `RTPM_DISABLE_UPDATES=false`, which re-enables updates on CI.
    #[must_use]
    pub fn updates_explicitly_enabled(&self) -> bool {
        self.disable_updates.as_deref() == Some("false")
    }
}

/// Effective update settings: config values with environment overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSettings {
    pub info_url: String,
    pub file_url: String,
    pub legacy_url: String,
    pub channel: Option<String>,
    pub check_timeout: Duration,
    pub cache_refresh_interval: Duration,
    pub auto_update: bool,
    pub strategy: InstallStrategy,
    pub rollout_tag: Option<String>,
    pub install_version: Option<String>,
    pub force_update: bool,
}

impl UpdateSettings {
    /// Environment wins over config, config wins over built-in defaults.
    #[must_use]
    pub fn resolve(config: &UpdateConfig, env: &EnvOverrides) -> Self {
        Self {
            info_url: env
                .info_url
                .clone()
                .or_else(|| config.info_url.clone())
                .unwrap_or_else(|| DEFAULT_INFO_URL.to_string()),
            file_url: env
                .file_url
                .clone()
                .or_else(|| config.file_url.clone())
                .unwrap_or_else(|| DEFAULT_FILE_URL.to_string()),
            legacy_url: env
                .legacy_url
                .clone()
                .or_else(|| config.legacy_url.clone())
                .unwrap_or_else(|| DEFAULT_LEGACY_URL.to_string()),
            channel: env.channel.clone().or_else(|| config.channel.clone()),
            check_timeout: Duration::from_millis(env.timeout_ms.unwrap_or(config.check_timeout_ms)),
            cache_refresh_interval: Duration::from_secs(config.cache_refresh_interval.max(1)),
            auto_update: config.auto_update,
            strategy: config.strategy,
            rollout_tag: config.rollout_tag.clone(),
            install_version: config.install_version.clone(),
            force_update: env.force_update,
        }
    }
}
