//! Platform capabilities used while installing an update.
//!
//! Each platform ships update bundles in its own archive format and has its
//! own rules for deleting a binary that may still be running. [`PlatformOps`]
//! captures both so the fetcher and the binary swap stay platform neutral.
//! [`NativePlatform`] picks the implementation for the build target; both
//! implementations are compiled everywhere so either format can be handled.

use crate::core::RtpmError;
use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// What happened to a file handed to [`PlatformOps::hide_or_remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// The file is gone (or never existed).
    Removed,
    /// The file could not be deleted and was hidden instead.
    Hidden,
}

/// Archive and filesystem operations that differ per platform.
pub trait PlatformOps: Send + Sync {
    /// Extension of update archives, including the leading dot.
    fn archive_extension(&self) -> &'static str;

    /// Unpacks a complete archive into `dir`.
    fn unarchive(&self, bytes: &[u8], dir: &Path) -> Result<()>;

    /// Returns the contents of the regular file called `name` anywhere in the archive.
    fn extract_file(&self, bytes: &[u8], name: &str) -> Result<Vec<u8>>;

    /// Deletes `path`, hiding it when the platform refuses the deletion.
    fn hide_or_remove(&self, path: &Path) -> Result<Disposal> {
        hide_or_remove(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        std::fs::rename(from, to)
    }
}

/// gzip-compressed tarballs, used on Linux and macOS.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzPlatform;

/// zip archives, used on Windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipPlatform;

#[cfg(windows)]
pub type NativePlatform = ZipPlatform;

#[cfg(not(windows))]
pub type NativePlatform = TarGzPlatform;

impl PlatformOps for TarGzPlatform {
    fn archive_extension(&self) -> &'static str {
        ".tar.gz"
    }

    fn unarchive(&self, bytes: &[u8], dir: &Path) -> Result<()> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive.set_preserve_permissions(true);
        archive.set_overwrite(false);
        archive.unpack(dir).map_err(|e| archive_error(dir, &e))?;
        Ok(())
    }

    fn extract_file(&self, bytes: &[u8], name: &str) -> Result<Vec<u8>> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        let entries = archive.entries().map_err(|e| archive_error(Path::new(name), &e))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| archive_error(Path::new(name), &e))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let matches = entry
                .path()
                .map(|path| path.file_name().is_some_and(|file_name| file_name == name))
                .unwrap_or(false);
            if matches {
                let mut contents = Vec::new();
                entry
                    .read_to_end(&mut contents)
                    .with_context(|| format!("Failed to read {name} from archive"))?;
                return Ok(contents);
            }
        }
        bail!("{name} not found in archive")
    }
}

impl PlatformOps for ZipPlatform {
    fn archive_extension(&self) -> &'static str {
        ".zip"
    }

    fn unarchive(&self, bytes: &[u8], dir: &Path) -> Result<()> {
        let mut archive =
            zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| archive_error(dir, &e))?;
        archive.extract(dir).map_err(|e| archive_error(dir, &e))?;
        Ok(())
    }

    fn extract_file(&self, bytes: &[u8], name: &str) -> Result<Vec<u8>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| archive_error(Path::new(name), &e))?;
        for index in 0..archive.len() {
            let mut file =
                archive.by_index(index).map_err(|e| archive_error(Path::new(name), &e))?;
            let matches = file.is_file()
                && file
                    .enclosed_name()
                    .is_some_and(|path| path.file_name().is_some_and(|file_name| file_name == name));
            if matches {
                let mut contents = Vec::new();
                file.read_to_end(&mut contents)
                    .with_context(|| format!("Failed to read {name} from archive"))?;
                return Ok(contents);
            }
        }
        bail!("{name} not found in archive")
    }
}

fn archive_error(path: &Path, error: &dyn std::fmt::Display) -> anyhow::Error {
    RtpmError::ArchiveError {
        path: path.display().to_string(),
        reason: error.to_string(),
    }
    .into()
}

/// Deletes `path`; when that fails, hides it so it no longer shows up.
///
/// A missing file counts as removed.
pub fn hide_or_remove(path: &Path) -> Result<Disposal> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(Disposal::Removed),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Disposal::Removed),
        Err(remove_error) => {
            debug!(path = %path.display(), error = %remove_error, "Removal refused, hiding file");
            hide_file(path).with_context(|| {
                format!("Failed to remove or hide {}: {remove_error}", path.display())
            })?;
            Ok(Disposal::Hidden)
        }
    }
}

#[cfg(windows)]
fn hide_file(path: &Path) -> Result<()> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{
        FILE_ATTRIBUTE_HIDDEN, GetFileAttributesW, INVALID_FILE_ATTRIBUTES, SetFileAttributesW,
    };

    let wide: Vec<u16> = path.as_os_str().encode_wide().chain(std::iter::once(0)).collect();
    // SAFETY: `wide` is NUL-terminated and outlives both calls
    let attributes = unsafe { GetFileAttributesW(wide.as_ptr()) };
    if attributes == INVALID_FILE_ATTRIBUTES {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("Failed to read attributes of {}", path.display()));
    }
    if unsafe { SetFileAttributesW(wide.as_ptr(), attributes | FILE_ATTRIBUTE_HIDDEN) } == 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("Failed to hide {}", path.display()));
    }
    Ok(())
}

#[cfg(not(windows))]
fn hide_file(path: &Path) -> Result<()> {
    let hidden = hidden_path(path);
    if hidden == path {
        return Ok(());
    }
    std::fs::rename(path, &hidden)
        .with_context(|| format!("Failed to rename {} to {}", path.display(), hidden.display()))
}

/// Dot-prefixed sibling of `path`.
#[cfg(not(windows))]
fn hidden_path(path: &Path) -> PathBuf {
    match path.file_name() {
        Some(name) if !name.to_string_lossy().starts_with('.') => {
            path.with_file_name(format!(".{}", name.to_string_lossy()))
        }
        _ => path.to_path_buf(),
    }
}
