//! Installing a fetched update.
//!
//! All strategies share one preparation step: the update is fetched into a
//! fresh, process-private temporary directory. What happens next depends on the
//! [`Installer`] variant the caller picked:
//!
//! - [`Installer::Detached`] starts `rtpm-installer` in the background and
//!   returns at once, so the calling process can exit and free its binary.
//!   The installer shares the caller's lock and keeps it after the caller exits.
//! - [`Installer::Supervised`] runs `rtpm-installer` in the foreground and
//!   waits for it.
//! - [`Installer::InPlaceSwap`] takes the `rtpm` binary out of the bundle and
//!   swaps it with the running one.
//!
//! Installing requires a held [`UpdateLock`] for the target directory.

use super::archive::PlatformOps;
use super::fetcher::Fetcher;
use super::lock::UpdateLock;
use super::model::AvailableUpdate;
use super::swap::{BinarySwap, SwapOutcome};
use crate::constants::{BINARY_NAME, INSTALLER_NAME, LEGACY_BUNDLE_DIR, UPDATE_TEMP_PREFIX, env};
use crate::core::RtpmError;
use crate::utils::executable_name;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// How an update is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installer {
    /// Start the installer in the background and return its PID.
    Detached,
    /// Run the installer and wait for it to finish.
    Supervised,
    /// Replace the running binary directly.
    InPlaceSwap,
}

/// What an installer invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// A detached installer is running.
    Spawned {
        pid: u32,
    },
    /// The supervised installer finished successfully.
    Completed,
    /// The binary was swapped in place.
    Swapped(SwapOutcome),
}

/// Installs one update into one installation directory.
///
/// # Examples
///
/// ```rust,no_run
/// use rtpm_cli::update::{Fetcher, Installer, UpdateInstaller, UpdateLock};
/// # use rtpm_cli::update::AvailableUpdate;
/// # use std::path::Path;
///
/// # async fn example(update: AvailableUpdate) -> anyhow::Result<()> {
/// let install_dir = Path::new("/opt/rtpm");
/// let exe = install_dir.join("bin/rtpm");
/// if let Some(lock) = UpdateLock::try_acquire(install_dir).await? {
///     let installer = UpdateInstaller::new(&update, Fetcher::new()?, install_dir, &exe);
///     installer.install(&lock, Installer::Supervised).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct UpdateInstaller<'a, P: PlatformOps + 'static> {
    update: &'a AvailableUpdate,
    fetcher: Fetcher<P>,
    install_dir: PathBuf,
    exe: PathBuf,
}

impl<'a, P: PlatformOps + 'static> UpdateInstaller<'a, P> {
    /// `install_dir` is the directory the installer writes to; `exe` is the
    /// binary an in-place swap replaces.
    pub fn new(
        update: &'a AvailableUpdate,
        fetcher: Fetcher<P>,
        install_dir: &Path,
        exe: &Path,
    ) -> Self {
        Self {
            update,
            fetcher,
            install_dir: install_dir.to_path_buf(),
            exe: exe.to_path_buf(),
        }
    }

    /// Fetches the update and applies it with `strategy`.
    ///
    /// `lock` must guard this installation directory; it stays held until the
    /// caller drops it. A detached installer shares it and holds it until it
    /// exits.
    pub async fn install(&self, lock: &UpdateLock, strategy: Installer) -> Result<InstallOutcome> {
        debug!(
            update = %self.update,
            lock = %lock.path().display(),
            strategy = ?strategy,
            "Installing update"
        );

        let staging = self.prepare().await?;
        let payload = payload_dir(staging.path());

        match strategy {
            Installer::Detached => {
                let installer = find_installer(&payload)?;
                // The installer outlives this process and owns the bundle from here on
                let bundle = staging.keep();
                debug!(bundle = %bundle.display(), "Leaving bundle for detached installer");
                let pid = self.spawn_detached(&installer, lock)?;
                Ok(InstallOutcome::Spawned {
                    pid,
                })
            }
            Installer::Supervised => {
                let installer = find_installer(&payload)?;
                self.run_supervised(&installer).await?;
                drop(staging);
                Ok(InstallOutcome::Completed)
            }
            Installer::InPlaceSwap => {
                let binary = find_binary(&payload)?;
                let contents = tokio::fs::read(&binary)
                    .await
                    .with_context(|| format!("Failed to read {}", binary.display()))?;
                let exe = self.exe.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    BinarySwap::new(exe).replace(&contents)
                })
                .await
                .context("spawn_blocking panicked")??;
                Ok(InstallOutcome::Swapped(outcome))
            }
        }
    }

    /// Fetches the update into a new temporary directory.
    async fn prepare(&self) -> Result<TempDir> {
        let staging = tempfile::Builder::new()
            .prefix(UPDATE_TEMP_PREFIX)
            .tempdir()
            .context("Failed to create temporary directory for update")?;
        self.fetcher.fetch(self.update, staging.path()).await?;
        Ok(staging)
    }

    fn installer_command(&self, installer: &Path) -> std::process::Command {
        let mut command = std::process::Command::new(installer);
        command.arg(&self.install_dir).arg("--update");
        if let Some(tag) = self.update.tag() {
            command.env(env::UPDATE_TAG, tag);
        }
        command
    }

    fn spawn_detached(&self, installer: &Path, lock: &UpdateLock) -> Result<u32> {
        let mut command = self.installer_command(installer);
        command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        detach(&mut command);
        lock.share_with(&mut command);

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to start {}", installer.display()))?;
        let pid = child.id();
        info!(pid, installer = %installer.display(), "Started detached installer");

        // Reap the child if this process outlives it
        tokio::task::spawn_blocking(move || {
            if let Err(e) = child.wait() {
                debug!(pid, error = %e, "Failed to wait for detached installer");
            }
        });
        Ok(pid)
    }

    async fn run_supervised(&self, installer: &Path) -> Result<()> {
        let mut command = tokio::process::Command::from(self.installer_command(installer));
        command.stdin(Stdio::inherit()).stdout(Stdio::inherit()).stderr(Stdio::inherit());

        info!(
            installer = %installer.display(),
            target = %self.install_dir.display(),
            "Running installer"
        );
        let status = command
            .status()
            .await
            .with_context(|| format!("Failed to run {}", installer.display()))?;

        if !status.success() {
            warn!(status = %status, "Installer failed");
            return Err(RtpmError::InstallerFailed {
                code: status.code(),
            }
            .into());
        }
        Ok(())
    }
}

/// Bundles from older releases wrap everything in a top-level directory.
fn payload_dir(staging: &Path) -> PathBuf {
    let legacy = staging.join(LEGACY_BUNDLE_DIR);
    if legacy.is_dir() { legacy } else { staging.to_path_buf() }
}

fn find_installer(payload: &Path) -> Result<PathBuf> {
    let name = executable_name(INSTALLER_NAME);
    let path = payload.join(&name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(RtpmError::InstallerNotFound {
            name,
            path: payload.display().to_string(),
        }
        .into())
    }
}

fn find_binary(payload: &Path) -> Result<PathBuf> {
    let name = executable_name(BINARY_NAME);
    [payload.join("bin").join(&name), payload.join(&name)]
        .into_iter()
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            RtpmError::InstallerNotFound {
                name,
                path: payload.display().to_string(),
            }
            .into()
        })
}

#[cfg(unix)]
fn detach(command: &mut std::process::Command) {
    use std::os::unix::process::CommandExt;
    // Own process group: terminal signals aimed at us do not reach the installer
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut std::process::Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}
