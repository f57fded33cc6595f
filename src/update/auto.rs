//! Opportunistic updates at CLI startup.
//!
//! [`AutoUpdater::run`] decides whether this invocation should look for an
//! update at all, asks its provider under a short deadline and, if an update
//! exists, installs it while holding the installation lock. Everything before
//! the lock fails open: timeouts, network trouble and lock contention simply
//! mean "no update this time". Once the lock is held, failures are returned to
//! the caller.
//!
//! The caller only needs two answers, see [`AutoUpdateOutcome::updated`] and
//! [`AutoUpdateOutcome::new_version`]. When an update was installed the caller
//! relaunches itself so the user's command runs on the new binary.

use super::archive::{NativePlatform, PlatformOps};
use super::config::{EnvOverrides, InstallStrategy, UpdateSettings};
use super::fetcher::Fetcher;
use super::installer::{InstallOutcome, Installer, UpdateInstaller};
use super::lock::UpdateLock;
use super::provider::UpdateInfoProvider;
use crate::constants::{CONFLICTING_COMMANDS, FRESH_INSTALL_WINDOW};
use crate::core::{is_integrity_error, is_permission_denied};
use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Why no update check was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The current project pins a tool version.
    ProjectPinned {
        version: String,
    },
    /// This process was relaunched by an updating parent.
    Forwarded,
    /// Running under a test harness.
    Testing,
    /// The command itself manages updates or the installation.
    ConflictingCommand {
        command: String,
    },
    /// Disabled through the environment.
    DisabledByEnv,
    ContinuousIntegration,
    /// The binary was installed or updated moments ago.
    FreshInstall,
    /// A specific version was installed on purpose.
    InstallVersionPinned {
        version: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectPinned {
                version,
            } => write!(f, "project pins version {version}"),
            Self::Forwarded => write!(f, "relaunched after an update"),
            Self::Testing => write!(f, "running under tests"),
            Self::ConflictingCommand {
                command,
            } => write!(f, "command '{command}' conflicts with updating"),
            Self::DisabledByEnv => write!(f, "disabled by environment"),
            Self::ContinuousIntegration => write!(f, "running in CI"),
            Self::FreshInstall => write!(f, "installed recently"),
            Self::InstallVersionPinned {
                version,
            } => write!(f, "version {version} installed on purpose"),
        }
    }
}

/// How an automatic update attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoUpdateOutcome {
    Skipped(SkipReason),
    /// The check missed its deadline.
    TimedOut,
    /// The check failed; already logged.
    CheckFailed,
    NoUpdate,
    /// An update exists but automatic installation is turned off.
    Disabled {
        version: String,
    },
    /// Another process is installing into the same directory.
    LockUnavailable,
    Installed {
        version: String,
        outcome: InstallOutcome,
    },
}

impl AutoUpdateOutcome {
    /// Whether a new version was installed.
    #[must_use]
    pub const fn updated(&self) -> bool {
        matches!(self, Self::Installed { .. })
    }

    /// The installed version, or an empty string when nothing was installed.
    #[must_use]
    pub fn new_version(&self) -> &str {
        match self {
            Self::Installed {
                version,
                ..
            } => version,
            _ => "",
        }
    }
}

/// Runs one automatic update attempt for one installation.
pub struct AutoUpdater<P, Q = NativePlatform>
where
    P: UpdateInfoProvider,
    Q: PlatformOps + Clone + 'static,
{
    provider: P,
    fetcher: Fetcher<Q>,
    settings: UpdateSettings,
    env: EnvOverrides,
    exe: PathBuf,
    install_dir: PathBuf,
    command: Option<String>,
    project_pin: Option<String>,
    installer: Installer,
}

impl<P, Q> AutoUpdater<P, Q>
where
    P: UpdateInfoProvider,
    Q: PlatformOps + Clone + 'static,
{
    /// `exe` is the running binary, `install_dir` the directory it was
    /// installed into.
    pub fn new(
        provider: P,
        fetcher: Fetcher<Q>,
        settings: UpdateSettings,
        env: EnvOverrides,
        exe: PathBuf,
        install_dir: PathBuf,
    ) -> Self {
        let installer = match settings.strategy {
            InstallStrategy::Installer => Installer::Supervised,
            InstallStrategy::InPlace => Installer::InPlaceSwap,
        };
        Self {
            provider,
            fetcher,
            settings,
            env,
            exe,
            install_dir,
            command: None,
            project_pin: None,
            installer,
        }
    }

    /// The subcommand the user invoked.
    #[must_use]
    pub fn with_command(mut self, command: Option<String>) -> Self {
        self.command = command;
        self
    }

    /// Tool version pinned by the project in the working directory.
    #[must_use]
    pub fn with_project_pin(mut self, version: Option<String>) -> Self {
        self.project_pin = version.filter(|v| !v.is_empty());
        self
    }

    #[must_use]
    pub fn with_installer(mut self, installer: Installer) -> Self {
        self.installer = installer;
        self
    }

    /// The first reason to skip the check, or `None` to proceed.
    ///
    /// Only local state is consulted; this never touches the network.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        if let Some(version) = &self.project_pin {
            return Some(SkipReason::ProjectPinned {
                version: version.clone(),
            });
        }
        if self.env.forwarded {
            return Some(SkipReason::Forwarded);
        }
        if self.env.test_auto_update {
            return None;
        }
        if self.env.testing {
            return Some(SkipReason::Testing);
        }
        if let Some(command) = &self.command
            && CONFLICTING_COMMANDS.contains(&command.as_str())
        {
            return Some(SkipReason::ConflictingCommand {
                command: command.clone(),
            });
        }
        if self.env.updates_disabled() {
            return Some(SkipReason::DisabledByEnv);
        }
        if self.env.ci && !self.env.updates_explicitly_enabled() {
            return Some(SkipReason::ContinuousIntegration);
        }
        if is_fresh_install(&self.exe) {
            return Some(SkipReason::FreshInstall);
        }
        if let Some(version) = &self.settings.install_version {
            return Some(SkipReason::InstallVersionPinned {
                version: version.clone(),
            });
        }
        None
    }

    /// Runs the attempt.
    ///
    /// Returns `Err` only for failures after the installation lock was taken.
    pub async fn run(&self) -> Result<AutoUpdateOutcome> {
        if let Some(reason) = self.skip_reason() {
            debug!(reason = %reason, "Skipping automatic update check");
            return Ok(AutoUpdateOutcome::Skipped(reason));
        }

        let timeout = self.settings.check_timeout;
        let update = match tokio::time::timeout(timeout, self.provider.current_update()).await {
            Err(_) => {
                debug!(timeout_ms = timeout.as_millis(), "Update check timed out");
                return Ok(AutoUpdateOutcome::TimedOut);
            }
            Ok(Err(e)) => {
                if is_integrity_error(&e) {
                    error!(error = %format!("{e:#}"), "Update info failed integrity checks");
                } else {
                    debug!(error = %format!("{e:#}"), "Update check failed");
                }
                return Ok(AutoUpdateOutcome::CheckFailed);
            }
            Ok(Ok(None)) => {
                debug!("No update available");
                return Ok(AutoUpdateOutcome::NoUpdate);
            }
            Ok(Ok(Some(update))) => update,
        };

        if !self.settings.auto_update {
            info!(version = update.version(), "Update available; automatic updates are turned off");
            return Ok(AutoUpdateOutcome::Disabled {
                version: update.version().to_string(),
            });
        }

        let lock = match UpdateLock::try_acquire(&self.install_dir).await {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                debug!(dir = %self.install_dir.display(), "Another process is updating");
                return Ok(AutoUpdateOutcome::LockUnavailable);
            }
            Err(e) if is_permission_denied(&e) => {
                return Err(e.context(permission_message(&self.install_dir)));
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Could not take the update lock");
                return Ok(AutoUpdateOutcome::LockUnavailable);
            }
        };

        info!(update = %update, dir = %self.install_dir.display(), "Installing update");
        let installer =
            UpdateInstaller::new(&update, self.fetcher.clone(), &self.install_dir, &self.exe);
        match installer.install(&lock, self.installer).await {
            Ok(outcome) => Ok(AutoUpdateOutcome::Installed {
                version: update.version().to_string(),
                outcome,
            }),
            Err(e) if is_permission_denied(&e) => {
                Err(e.context(permission_message(&self.install_dir)))
            }
            Err(e) => Err(e.context(format!("Failed to install rtpm {}", update.version()))),
        }
    }
}

fn permission_message(dir: &Path) -> String {
    format!("Could not update rtpm: no permission to write to {}", dir.display())
}

/// Whether `exe` changed within the fresh-install window.
///
/// An unreadable timestamp counts as fresh.
fn is_fresh_install(exe: &Path) -> bool {
    let modified = match std::fs::metadata(exe).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) => {
            debug!(exe = %exe.display(), error = %e, "Could not read executable timestamp");
            return true;
        }
    };
    modified.elapsed().map_or(true, |age| age < FRESH_INSTALL_WINDOW)
}
