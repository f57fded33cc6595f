//! Test utilities for rtpm
//!
//! Helpers shared by unit tests and the integration suites: logging setup,
//! in-memory archive builders that mimic update bundles, and a fixture for a
//! fake installation directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use rtpm_cli::test_utils::{ArchiveEntry, tar_gz_archive};
//!
//! let bundle = tar_gz_archive(&[
//!     ArchiveEntry::executable("rtpm-installer", b"#!/bin/sh\nexit 0\n"),
//!     ArchiveEntry::file("bin/rtpm", b"binary"),
//! ]);
//! assert!(!bundle.is_empty());
//! ```

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses the provided level, or `RUST_LOG` when no level is given. Without
/// either, tests run silently.
///
/// ```bash
/// RUST_LOG=rtpm_cli=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// One file inside a test archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub contents: Vec<u8>,
    pub mode: u32,
}

impl ArchiveEntry {
    /// A regular, non-executable file.
    pub fn file(path: &str, contents: &[u8]) -> Self {
        Self {
            path: path.to_string(),
            contents: contents.to_vec(),
            mode: 0o644,
        }
    }

    /// An executable file.
    pub fn executable(path: &str, contents: &[u8]) -> Self {
        Self {
            path: path.to_string(),
            contents: contents.to_vec(),
            mode: 0o755,
        }
    }
}

/// Builds a gzip-compressed tarball in memory.
pub fn tar_gz_archive(entries: &[ArchiveEntry]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(entry.contents.len() as u64);
        header.set_mode(entry.mode);
        header.set_entry_type(tar::EntryType::Regular);
        builder
            .append_data(&mut header, &entry.path, entry.contents.as_slice())
            .unwrap_or_else(|e| panic!("Failed to append {} to tarball: {e}", entry.path));
    }
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .unwrap_or_else(|e| panic!("Failed to finish tarball: {e}"))
}

/// Builds a zip archive in memory.
pub fn zip_archive(entries: &[ArchiveEntry]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        let options = zip::write::SimpleFileOptions::default().unix_permissions(entry.mode);
        writer
            .start_file(entry.path.as_str(), options)
            .unwrap_or_else(|e| panic!("Failed to start {} in zip: {e}", entry.path));
        writer
            .write_all(&entry.contents)
            .unwrap_or_else(|e| panic!("Failed to write {} to zip: {e}", entry.path));
    }
    writer.finish().unwrap_or_else(|e| panic!("Failed to finish zip: {e}")).into_inner()
}

/// Archive in the native update format of this platform.
pub fn native_archive(entries: &[ArchiveEntry]) -> Vec<u8> {
    if cfg!(windows) { zip_archive(entries) } else { tar_gz_archive(entries) }
}

/// Hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    crate::update::verification::ChecksumVerifier::compute_sha256(data)
}

/// A fake installation: `<root>/bin/rtpm` holding known bytes.
pub struct InstallFixture {
    pub root: PathBuf,
    pub exe: PathBuf,
}

impl InstallFixture {
    /// Creates the installation under `root` with `contents` as the binary.
    pub fn create(root: &Path, contents: &[u8]) -> Self {
        let bin = root.join("bin");
        std::fs::create_dir_all(&bin).unwrap_or_else(|e| panic!("Failed to create bin: {e}"));
        let exe = bin.join(crate::utils::executable_name(crate::constants::BINARY_NAME));
        std::fs::write(&exe, contents).unwrap_or_else(|e| panic!("Failed to write binary: {e}"));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755))
                .unwrap_or_else(|e| panic!("Failed to chmod binary: {e}"));
        }
        Self {
            root: root.to_path_buf(),
            exe,
        }
    }
}
