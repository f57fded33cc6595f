//! Platform-specific helpers.
//!
//! Update artifacts are addressed by an `<os>-<arch>` identifier, executables
//! carry a platform extension on Windows, and the installation directory is
//! derived from where the running binary lives. Everything platform dependent
//! that the update engine needs outside of archive handling lives here.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Identifier of the running platform as the update server knows it.
///
/// ```rust,no_run
/// use rtpm_cli::utils::platform::platform_id;
///
/// // e.g. "linux-x86_64", "macos-aarch64", "windows-x86_64"
/// println!("{}", platform_id());
/// ```
#[must_use]
pub fn platform_id() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Appends the platform executable extension to `base`.
#[must_use]
pub fn executable_name(base: &str) -> String {
    format!("{base}{}", std::env::consts::EXE_SUFFIX)
}

/// Resolves the path of the running executable, following symlinks.
pub fn current_exe() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to get current executable path")?;
    Ok(std::fs::canonicalize(&exe).unwrap_or(exe))
}

/// Derives the installation directory from an executable path.
///
/// A binary living in a `bin` directory belongs to the directory above it,
/// otherwise the binary's own directory is the installation.
///
/// ```rust,no_run
/// use rtpm_cli::utils::platform::install_dir_from_exe;
/// use std::path::Path;
///
/// let dir = install_dir_from_exe(Path::new("/opt/rtpm/bin/rtpm")).unwrap();
/// assert_eq!(dir, Path::new("/opt/rtpm"));
/// ```
pub fn install_dir_from_exe(exe: &Path) -> Result<PathBuf> {
    let parent = exe
        .parent()
        .with_context(|| format!("Executable has no parent directory: {}", exe.display()))?;
    match (parent.file_name(), parent.parent()) {
        (Some(name), Some(root)) if name == "bin" => Ok(root.to_path_buf()),
        _ => Ok(parent.to_path_buf()),
    }
}
