//! Download, verification and unpacking of update archives.

use super::archive::{NativePlatform, PlatformOps};
use super::model::AvailableUpdate;
use super::verification::ChecksumVerifier;
use crate::constants::HTTP_REQUEST_TIMEOUT;
use crate::core::RtpmError;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Downloads an update archive, checks it against the advertised SHA-256 and
/// unpacks it.
///
/// The archive is held in memory until it has been verified, so a checksum
/// mismatch never leaves anything on disk.
#[derive(Debug, Clone)]
pub struct Fetcher<P: PlatformOps = NativePlatform> {
    client: reqwest::Client,
    platform: Arc<P>,
}

impl Fetcher<NativePlatform> {
    /// A fetcher using the native archive format.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self::with_platform(client, NativePlatform::default()))
    }
}

impl<P: PlatformOps + 'static> Fetcher<P> {
    pub fn with_platform(client: reqwest::Client, platform: P) -> Self {
        Self {
            client,
            platform: Arc::new(platform),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Downloads, verifies and unpacks `update` into `target_dir`.
    ///
    /// `target_dir` is created when missing and must otherwise be empty; a
    /// non-empty directory is rejected before any network traffic and left
    /// untouched. If unpacking fails half way the directory is emptied again.
    pub async fn fetch(&self, update: &AvailableUpdate, target_dir: &Path) -> Result<()> {
        ensure_empty_dir(target_dir).await?;

        let bytes = self.download(update.url(), update.archive_name()).await?;
        ChecksumVerifier::verify_checksum(update.archive_name(), &bytes, update.sha256())?;

        info!(
            update = %update,
            target = %target_dir.display(),
            bytes = bytes.len(),
            "Unpacking update"
        );

        let platform = Arc::clone(&self.platform);
        let dir = target_dir.to_path_buf();
        let result = tokio::task::spawn_blocking(move || platform.unarchive(&bytes, &dir))
            .await
            .context("spawn_blocking panicked")?;

        if let Err(e) = result {
            clear_dir(target_dir).await;
            return Err(e);
        }
        Ok(())
    }

    /// Downloads `url` in full. `name` identifies the artifact in errors.
    pub async fn download(&self, url: &str, name: &str) -> Result<Vec<u8>> {
        debug!(url, "Downloading update archive");

        let response = self.client.get(url).send().await.map_err(|e| RtpmError::NetworkError {
            operation: format!("download of {name}"),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RtpmError::NetworkError {
                operation: format!("download of {name}"),
                reason: format!("HTTP {status} from {url}"),
            }
            .into());
        }

        let bytes = response.bytes().await.map_err(|e| RtpmError::NetworkError {
            operation: format!("download of {name}"),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

async fn ensure_empty_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    if entries.next_entry().await?.is_some() {
        return Err(RtpmError::DirectoryNotEmpty {
            path: dir.display().to_string(),
        }
        .into());
    }
    Ok(())
}

/// Best-effort removal of everything inside `dir`.
async fn clear_dir(dir: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let result = match entry.file_type().await {
            Ok(kind) if kind.is_dir() => tokio::fs::remove_dir_all(&path).await,
            _ => tokio::fs::remove_file(&path).await,
        };
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to clean up partial unpack");
        }
    }
}
