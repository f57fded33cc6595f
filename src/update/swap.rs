//! In-place replacement of the running binary.
//!
//! The new binary is written next to the old one, then two renames move the
//! old binary aside and the new one into place. If the second rename fails the
//! old binary is renamed back. Only when that recovery also fails is the
//! installation left without a binary, and both errors are reported.
//!
//! ```text
//! rtpm        -> rtpm.old
//! rtpm.new    -> rtpm
//! rtpm.old    -> removed (or hidden when the OS refuses)
//! ```

use super::archive::{Disposal, NativePlatform, PlatformOps};
use crate::core::RtpmError;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of a successful swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    /// What happened to the previous binary; `None` when it is still on disk
    /// as `<name>.old`.
    pub old_binary: Option<Disposal>,
}

/// Replaces the binary at `target` with new contents.
pub struct BinarySwap<P: PlatformOps = NativePlatform> {
    target: PathBuf,
    new_path: PathBuf,
    old_path: PathBuf,
    platform: P,
}

impl BinarySwap<NativePlatform> {
    pub fn new(target: PathBuf) -> Self {
        Self::with_platform(target, NativePlatform::default())
    }
}

impl<P: PlatformOps> BinarySwap<P> {
    pub fn with_platform(target: PathBuf, platform: P) -> Self {
        let new_path = sibling(&target, "new");
        let old_path = sibling(&target, "old");
        Self {
            target,
            new_path,
            old_path,
            platform,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn new_path(&self) -> &Path {
        &self.new_path
    }

    pub fn old_path(&self) -> &Path {
        &self.old_path
    }

    /// Installs `contents` as the new binary.
    ///
    /// Blocking; async callers should run it in `spawn_blocking`.
    pub fn replace(&self, contents: &[u8]) -> Result<SwapOutcome> {
        self.write_new(contents)?;

        // A leftover from an earlier update would make the rename below fail on Windows
        if self.old_path.exists()
            && let Err(e) = self.platform.hide_or_remove(&self.old_path)
        {
            warn!(path = %self.old_path.display(), error = %e, "Failed to clear stale old binary");
        }

        if let Err(e) = self.platform.rename(&self.target, &self.old_path) {
            self.discard_new();
            return Err(e).with_context(|| {
                format!(
                    "Failed to move {} to {}",
                    self.target.display(),
                    self.old_path.display()
                )
            });
        }

        if let Err(update_error) = self.platform.rename(&self.new_path, &self.target) {
            warn!(
                target = %self.target.display(),
                error = %update_error,
                "Failed to move new binary into place, restoring previous binary"
            );
            return match self.platform.rename(&self.old_path, &self.target) {
                Ok(()) => {
                    self.discard_new();
                    Err(update_error).with_context(|| {
                        format!(
                            "Failed to move {} into place; previous binary restored",
                            self.new_path.display()
                        )
                    })
                }
                Err(recovery_error) => Err(RtpmError::SwapRecoveryFailed {
                    path: self.target.display().to_string(),
                    update_error: update_error.to_string(),
                    recovery_error: recovery_error.to_string(),
                }
                .into()),
            };
        }

        info!(target = %self.target.display(), "Binary replaced");

        let old_binary = match self.platform.hide_or_remove(&self.old_path) {
            Ok(disposal) => Some(disposal),
            Err(e) => {
                warn!(path = %self.old_path.display(), error = %e, "Failed to remove old binary");
                None
            }
        };
        Ok(SwapOutcome {
            old_binary,
        })
    }

    fn write_new(&self, contents: &[u8]) -> Result<()> {
        let result = (|| -> Result<()> {
            let mut file = File::create(&self.new_path)?;
            file.write_all(contents)?;
            file.sync_all()?;
            drop(file);
            copy_permissions(&self.target, &self.new_path)
        })();

        if let Err(e) = result {
            self.discard_new();
            return Err(e)
                .with_context(|| format!("Failed to write {}", self.new_path.display()));
        }
        debug!(path = %self.new_path.display(), bytes = contents.len(), "New binary written");
        Ok(())
    }

    fn discard_new(&self) {
        if let Err(e) = std::fs::remove_file(&self.new_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!(path = %self.new_path.display(), error = %e, "Failed to remove new binary");
        }
    }
}

/// Removes the `.old` binary a previous update could not delete.
///
/// Runs at startup, once the previous binary is no longer executing.
pub fn cleanup_old_binary(exe: &Path) {
    let old_path = sibling(exe, "old");
    if let Err(e) = super::archive::hide_or_remove(&old_path) {
        debug!(path = %old_path.display(), error = %e, "Failed to clean up old binary");
    }

    #[cfg(not(windows))]
    if let Some(name) = old_path.file_name() {
        let hidden = old_path.with_file_name(format!(".{}", name.to_string_lossy()));
        if let Err(e) = std::fs::remove_file(&hidden)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!(path = %hidden.display(), error = %e, "Failed to clean up hidden old binary");
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!("{name}.{suffix}"))
}

#[cfg(unix)]
fn copy_permissions(from: &Path, to: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = match std::fs::metadata(from) {
        Ok(metadata) => metadata.permissions(),
        Err(_) => std::fs::Permissions::from_mode(0o755),
    };
    std::fs::set_permissions(to, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_permissions(_from: &Path, _to: &Path) -> Result<()> {
    Ok(())
}
