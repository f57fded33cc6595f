//! Error formatting and classification for rtpm
//!
//! Converts internal errors into clear, actionable messages for users and
//! answers the questions the update orchestrator asks of an error chain:
//! was it a permission problem, was it lock contention, was it an integrity
//! failure.

use super::error::{ErrorContext, RtpmError};
use std::io::ErrorKind;

const NETWORK_ERROR_KEYWORDS: &[&str] = &["network", "connection", "timed out", "dns"];

/// Suggestion shown whenever an update fails because of missing permissions.
pub const PERMISSION_SUGGESTION: &str = "Re-run the update with elevated privileges (for example \
     with sudo, or from an administrator prompt), or reinstall rtpm into a directory you own";

/// Find the first [`RtpmError`] in an error chain.
#[must_use]
pub fn find_rtpm_error(error: &anyhow::Error) -> Option<&RtpmError> {
    error.chain().find_map(|cause| cause.downcast_ref::<RtpmError>())
}

/// Whether any error in the chain is a permission failure.
///
/// Matches [`RtpmError::PermissionDenied`] as well as raw `io::Error`s of kind
/// `PermissionDenied`, including ones wrapped in [`RtpmError::IoError`].
#[must_use]
pub fn is_permission_denied(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        if let Some(io_error) = cause.downcast_ref::<std::io::Error>() {
            return io_error.kind() == ErrorKind::PermissionDenied;
        }
        match cause.downcast_ref::<RtpmError>() {
            Some(RtpmError::PermissionDenied { .. }) => true,
            Some(RtpmError::IoError(io_error)) => io_error.kind() == ErrorKind::PermissionDenied,
            _ => false,
        }
    })
}

/// Whether the chain reports that another process holds the update lock.
#[must_use]
pub fn is_lock_contention(error: &anyhow::Error) -> bool {
    matches!(find_rtpm_error(error), Some(RtpmError::UpdateInProgress { .. }))
}

/// Whether the chain reports untrustworthy update data.
#[must_use]
pub fn is_integrity_error(error: &anyhow::Error) -> bool {
    find_rtpm_error(error).is_some_and(RtpmError::is_integrity_error)
}

/// Convert any error into an [`ErrorContext`] with a suggestion for the user.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if is_permission_denied(&error) {
        return ErrorContext::new(RtpmError::Other {
            message: error.to_string(),
        })
        .with_suggestion(PERMISSION_SUGGESTION)
        .with_details(format_chain(&error));
    }

    if let Some(rtpm_error) = find_rtpm_error(&error) {
        let details = format_chain(&error);
        let context = create_error_context(rtpm_error);
        return if context.details.is_none() && error.chain().count() > 1 {
            context.with_details(details)
        } else {
            context
        };
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        return ErrorContext::new(RtpmError::FileSystemError {
            operation: "file operation".to_string(),
            path: "unknown path".to_string(),
        })
        .with_suggestion("Check file permissions and disk space")
        .with_details(format!("IO error: {io_error}"));
    }

    let error_msg = format_chain(&error);
    let lowercase = error_msg.to_lowercase();
    if NETWORK_ERROR_KEYWORDS.iter().any(|&keyword| lowercase.contains(keyword)) {
        return ErrorContext::new(RtpmError::NetworkError {
            operation: "network request".to_string(),
            reason: error_msg,
        })
        .with_suggestion("Check your internet connection and try again");
    }

    ErrorContext::new(RtpmError::Other {
        message: error.to_string(),
    })
    .with_details(error_msg)
}

/// Build the suggestion/details pair for a known error.
fn create_error_context(error: &RtpmError) -> ErrorContext {
    let base = ErrorContext::new(RtpmError::Other {
        message: error.to_string(),
    });
    match error {
        RtpmError::NetworkError { .. } | RtpmError::UpdateInfoStatus { .. } => base
            .with_suggestion("Check your internet connection and try again")
            .with_details("The update server could not be reached"),
        RtpmError::InvalidUpdateInfo { .. } | RtpmError::JsonError(_) => base
            .with_suggestion("Try again later; if the problem persists report it")
            .with_details("The update server returned data that could not be trusted"),
        RtpmError::ChecksumMismatch { .. } => base
            .with_suggestion("Try the update again; the download may have been corrupted")
            .with_details("Nothing was installed"),
        RtpmError::DirectoryNotEmpty { .. } => {
            base.with_suggestion("Remove the directory contents or choose an empty directory")
        }
        RtpmError::UpdateInProgress { .. } => {
            base.with_suggestion("Wait for the running update to finish and try again")
        }
        RtpmError::InstallerNotFound { .. } => base
            .with_suggestion("The update bundle is incomplete; try again later")
            .with_details("The bundle did not contain the expected executable"),
        RtpmError::InstallerFailed { .. } => {
            base.with_suggestion("Check the installer output above for the cause")
        }
        RtpmError::SwapRecoveryFailed { path, .. } => base
            .with_suggestion(format!("Reinstall rtpm; the binary at {path} may be missing"))
            .with_details("Both the update and the attempt to restore the previous binary failed"),
        RtpmError::PermissionDenied { .. } => base.with_suggestion(PERMISSION_SUGGESTION),
        RtpmError::ConfigError { .. } | RtpmError::TomlError(_) => {
            base.with_suggestion("Check the syntax of your rtpm configuration files")
        }
        _ => base,
    }
}

fn format_chain(error: &anyhow::Error) -> String {
    error.chain().map(ToString::to_string).collect::<Vec<_>>().join(": ")
}
