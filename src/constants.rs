//! Global constants used throughout the rtpm codebase.
//!
//! This module contains timeout durations, file names, and environment
//! variable names shared by the update engine and the CLI. Defining them
//! centrally keeps the on-disk and environment contract in one place.

use std::time::Duration;

/// Name of the tool binary, without platform extension.
pub const BINARY_NAME: &str = "rtpm";

/// Name of the installer shipped inside every update bundle.
pub const INSTALLER_NAME: &str = "rtpm-installer";

/// Top-level directory used by older bundles to wrap their payload.
pub const LEGACY_BUNDLE_DIR: &str = "rtpm-install";

/// Lock file created inside the target installation directory.
pub const UPDATE_LOCK_FILE: &str = "install.lock";

/// Prefix of the process-private directory each update is unpacked into.
pub const UPDATE_TEMP_PREFIX: &str = "rtpm-update";

/// Project file that may pin the tool version.
pub const PROJECT_CONFIG_FILE: &str = "rtpm.toml";

/// Channel used when the build did not embed one.
pub const DEFAULT_CHANNEL: &str = "release";

/// Default base URL of the update info endpoint.
pub const DEFAULT_INFO_URL: &str = "https://platform.rtpm.dev/sv/update-info";

/// Default base URL of the file host serving update archives.
pub const DEFAULT_FILE_URL: &str = "https://files.rtpm.dev";

/// Default base URL of the legacy (first generation) update host.
pub const DEFAULT_LEGACY_URL: &str = "https://files.rtpm.dev/update";

/// Default upper bound for the startup update check.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default refresh interval of the update cache actor.
pub const DEFAULT_CACHE_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// An executable modified more recently than this is treated as freshly installed.
pub const FRESH_INSTALL_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// How long `rtpm service` waits between polls of the update cache.
pub const SERVICE_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Timeout for a single HTTP request made by the update engine.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Commands that must never trigger an automatic update.
pub const CONFLICTING_COMMANDS: &[&str] = &["update", "service", "clean"];

/// Environment variable names read by the update engine.
pub mod env {
    /// Overrides the update info endpoint base URL.
    pub const UPDATE_INFO_URL: &str = "RTPM_UPDATE_INFO_URL";
    /// Overrides the archive file host base URL.
    pub const UPDATE_URL: &str = "RTPM_UPDATE_URL";
    /// Overrides the legacy update host base URL.
    pub const LEGACY_UPDATE_URL: &str = "RTPM_LEGACY_UPDATE_URL";
    /// `true` disables automatic updates, `false` re-enables them on CI.
    pub const DISABLE_UPDATES: &str = "RTPM_DISABLE_UPDATES";
    /// `true` reinstalls even when the current version is already running.
    pub const FORCE_UPDATE: &str = "RTPM_FORCE_UPDATE";
    /// Check timeout in milliseconds.
    pub const UPDATE_TIMEOUT_MS: &str = "RTPM_UPDATE_TIMEOUT_MS";
    /// Overrides the channel updates are requested from.
    pub const UPDATE_CHANNEL: &str = "RTPM_UPDATE_CHANNEL";
    /// `true` forces the auto-update path on, for tests.
    pub const TEST_AUTO_UPDATE: &str = "RTPM_TEST_AUTO_UPDATE";
    /// Set on a relaunched child so it does not update again.
    pub const FORWARDED: &str = "RTPM_FORWARDED";
    /// Set by test harnesses.
    pub const TESTING: &str = "RTPM_TESTING";
    /// Path to the global config file.
    pub const CONFIG: &str = "RTPM_CONFIG";
    /// Passed to installers carrying the rollout tag of the update.
    pub const UPDATE_TAG: &str = "RTPM_UPDATE_TAG";
    /// Passed to detached installers: the update lock they share with the caller.
    pub const INSTALL_LOCK: &str = "RTPM_INSTALL_LOCK";
    /// Disables progress spinners.
    pub const NO_PROGRESS: &str = "RTPM_NO_PROGRESS";
    /// Variables whose presence marks a CI environment.
    pub const CI_MARKERS: &[&str] =
        &["CI", "CONTINUOUS_INTEGRATION", "BUILD_NUMBER", "GITHUB_ACTIONS", "BUILDER_OUTPUT"];
}
