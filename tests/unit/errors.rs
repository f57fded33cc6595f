//! How update failures are classified and presented.

use anyhow::Context;
use rtpm_cli::core::{
    RtpmError, find_rtpm_error, is_integrity_error, is_lock_contention, is_permission_denied,
    user_friendly_error,
};

#[test]
fn test_integrity_errors_survive_context() {
    let result: anyhow::Result<()> = Err(RtpmError::ChecksumMismatch {
        name: "rtpm.tar.gz".to_string(),
        expected: "a".repeat(64),
        actual: "b".repeat(64),
    }
    .into());
    let error = result.context("Failed to install rtpm 1.1.0").unwrap_err();

    assert!(is_integrity_error(&error));
    assert!(!is_lock_contention(&error));
    assert!(!is_permission_denied(&error));
    assert!(matches!(find_rtpm_error(&error), Some(RtpmError::ChecksumMismatch { .. })));
}

#[test]
fn test_network_error_gets_connection_hint() {
    let error = anyhow::anyhow!("error sending request: connection refused");
    let ctx = user_friendly_error(error);
    assert!(ctx.suggestion.unwrap().contains("internet connection"));
}

#[test]
fn test_swap_recovery_failure_names_binary() {
    let error = anyhow::Error::from(RtpmError::SwapRecoveryFailed {
        path: "/opt/rtpm/bin/rtpm".to_string(),
        update_error: "rename failed".to_string(),
        recovery_error: "rename failed".to_string(),
    });
    let ctx = user_friendly_error(error);
    assert!(ctx.suggestion.unwrap().contains("/opt/rtpm/bin/rtpm"));
    assert!(ctx.details.is_some());
}

#[test]
fn test_lock_contention_suggests_waiting() {
    let error = anyhow::Error::from(RtpmError::UpdateInProgress {
        lock_path: "/opt/rtpm/install.lock".to_string(),
    });
    assert!(is_lock_contention(&error));

    let ctx = user_friendly_error(error);
    assert!(ctx.error.to_string().contains("/opt/rtpm/install.lock"));
    assert!(ctx.suggestion.unwrap().contains("Wait"));
}

#[test]
fn test_installer_exit_is_described() {
    let by_code = RtpmError::InstallerFailed {
        code: Some(2),
    };
    assert_eq!(by_code.to_string(), "Installer exited with status 2");

    let by_signal = RtpmError::InstallerFailed {
        code: None,
    };
    assert_eq!(by_signal.to_string(), "Installer exited with a signal");
}

#[test]
fn test_permission_context_keeps_message() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let error = anyhow::Error::from(io)
        .context("Could not update rtpm: no permission to write to /opt/rtpm");

    assert!(is_permission_denied(&error));
    let ctx = user_friendly_error(error);
    assert_eq!(
        ctx.error.to_string(),
        "Could not update rtpm: no permission to write to /opt/rtpm"
    );
    assert!(ctx.suggestion.is_some());
}
