use crate::core::RtpmError;
use anyhow::Result;
use sha2::{Digest, Sha256};
use tracing::debug;

/// SHA-256 verification of downloaded update artifacts.
///
/// Checksums are plain lowercase hex as published by the update server.
/// Comparison ignores case so uppercase checksums are accepted too.
///
/// # Examples
///
/// ```rust,no_run
/// use rtpm_cli::update::verification::ChecksumVerifier;
///
/// let data = b"Hello, World!";
/// let checksum = ChecksumVerifier::compute_sha256(data);
/// ChecksumVerifier::verify_checksum("greeting.txt", data, &checksum).unwrap();
/// ```
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Hex-encoded SHA-256 of `data`.
    pub fn compute_sha256(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Fails with [`RtpmError::ChecksumMismatch`] unless `data` hashes to `expected`.
    ///
    /// `name` identifies the artifact in the error message.
    pub fn verify_checksum(name: &str, data: &[u8], expected: &str) -> Result<()> {
        let actual = Self::compute_sha256(data);

        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(RtpmError::ChecksumMismatch {
                name: name.to_string(),
                expected: expected.to_string(),
                actual,
            }
            .into());
        }

        debug!(artifact = name, bytes = data.len(), "Checksum verification successful");
        Ok(())
    }
}
