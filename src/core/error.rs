//! Error handling for rtpm
//!
//! This module provides the strongly-typed error enum used across the update
//! engine and the user-facing wrapper that adds suggestions for CLI users.
//!
//! # Architecture
//!
//! - [`RtpmError`] - enumerated failure cases
//! - [`ErrorContext`] - wrapper that adds user-friendly messages and suggestions
//!
//! Functions throughout the crate return [`anyhow::Result`] and attach context
//! with `.context()`. Callers that need to branch on the failure kind walk the
//! chain with the helpers in [`crate::core::error_formatting`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use rtpm_cli::core::{RtpmError, ErrorContext};
//!
//! let context = ErrorContext::new(RtpmError::UpdateInProgress {
//!     lock_path: "/opt/rtpm/install.lock".to_string(),
//! })
//! .with_suggestion("Wait for the running update to finish and try again");
//!
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Failure cases of the rtpm update engine.
///
/// Variants are grouped by the category they belong to when an update attempt
/// is aborted: network, integrity, contention, filesystem and installation.
#[derive(Error, Debug)]
pub enum RtpmError {
    /// A network request failed before a response was received.
    #[error("Network error during {operation}: {reason}")]
    NetworkError {
        operation: String,
        reason: String,
    },

    /// The update info endpoint answered with a non-success status.
    #[error("Update info request to {url} failed with HTTP {status}")]
    UpdateInfoStatus {
        url: String,
        status: u16,
    },

    /// The update info response could not be parsed or is incomplete.
    #[error("Invalid update info: {reason}")]
    InvalidUpdateInfo {
        reason: String,
    },

    /// Downloaded bytes do not hash to the advertised checksum.
    #[error("Checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// An archive could not be unpacked.
    #[error("Failed to extract archive into {path}: {reason}")]
    ArchiveError {
        path: String,
        reason: String,
    },

    /// The directory an update should be unpacked into already has content.
    #[error("Target directory is not empty: {path}")]
    DirectoryNotEmpty {
        path: String,
    },

    /// Another process holds the update lock for this installation.
    #[error("Another update is already in progress (lock: {lock_path})")]
    UpdateInProgress {
        lock_path: String,
    },

    /// The update bundle does not contain the expected executable.
    #[error("{name} not found in update bundle at {path}")]
    InstallerNotFound {
        name: String,
        path: String,
    },

    /// The installer process exited unsuccessfully.
    #[error("Installer exited with {}", describe_exit(.code))]
    InstallerFailed {
        code: Option<i32>,
    },

    /// Replacing the running binary failed and so did putting it back.
    #[error("Update of {path} failed: {update_error}; recovery also failed: {recovery_error}")]
    SwapRecoveryFailed {
        path: String,
        update_error: String,
        recovery_error: String,
    },

    /// The user lacks permission on a path the update touches.
    #[error("Permission denied: {operation} on {path}")]
    PermissionDenied {
        operation: String,
        path: String,
    },

    /// A filesystem operation failed.
    #[error("File system error: {operation} on {path}")]
    FileSystemError {
        operation: String,
        path: String,
    },

    /// The global or project configuration is unusable.
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{message}")]
    Other {
        message: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

impl RtpmError {
    /// Whether this error means the downloaded or advertised data cannot be trusted.
    #[must_use]
    pub const fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. }
                | Self::InvalidUpdateInfo { .. }
                | Self::JsonError(_)
                | Self::ArchiveError { .. }
        )
    }
}

/// An [`RtpmError`] paired with optional user-facing guidance.
///
/// The suggestion is an actionable next step; details explain what happened.
/// [`ErrorContext::display`] prints all three in color on stderr.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: RtpmError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: RtpmError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}
