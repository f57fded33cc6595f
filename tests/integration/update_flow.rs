//! End-to-end update flows against a mock release server.
//!
//! Each test runs the real checker, fetcher, lock and installer against an
//! installation in a temporary directory.

use crate::common::{MockRelease, aged_install, release_bundle};
use rtpm_cli::core::{RtpmError, find_rtpm_error, is_integrity_error};
use rtpm_cli::test_utils::{InstallFixture, init_test_logging};
use rtpm_cli::update::{
    AutoUpdateOutcome, AutoUpdater, Checker, EnvOverrides, Fetcher, InstallOutcome, Installer,
    LegacyUpdater, Origin, UpdateCache, UpdateLock,
};
use std::time::Duration;
use tempfile::TempDir;

fn updater(
    release: &MockRelease,
    install: &InstallFixture,
    installer: Installer,
) -> AutoUpdater<Checker> {
    init_test_logging(None);
    let settings = release.settings();
    let checker = Checker::new(&settings, Origin::new("release", "1.0.0")).unwrap();
    AutoUpdater::new(
        checker,
        Fetcher::new().unwrap(),
        settings,
        release.env(),
        install.exe.clone(),
        install.root.clone(),
    )
    .with_installer(installer)
}

#[tokio::test]
async fn test_in_place_update_replaces_binary() {
    let release = MockRelease::publish("1.1.0", b"rtpm 1.1.0").await;
    let temp = TempDir::new().unwrap();
    let install = aged_install(temp.path(), b"rtpm 1.0.0");

    let outcome = updater(&release, &install, Installer::InPlaceSwap).run().await.unwrap();

    assert!(matches!(
        outcome,
        AutoUpdateOutcome::Installed {
            outcome: InstallOutcome::Swapped(_),
            ..
        }
    ));
    assert_eq!(outcome.new_version(), "1.1.0");
    assert_eq!(std::fs::read(&install.exe).unwrap(), b"rtpm 1.1.0");

    let name = install.exe.file_name().unwrap().to_string_lossy().into_owned();
    assert!(!install.exe.with_file_name(format!("{name}.new")).exists());
    release.info.assert_async().await;
}

#[tokio::test]
async fn test_stale_swap_leftovers_do_not_block_update() {
    let release = MockRelease::publish("1.1.0", b"rtpm 1.1.0").await;
    let temp = TempDir::new().unwrap();
    let install = aged_install(temp.path(), b"rtpm 1.0.0");
    let name = install.exe.file_name().unwrap().to_string_lossy().into_owned();
    std::fs::write(install.exe.with_file_name(format!("{name}.new")), b"half written").unwrap();
    std::fs::write(install.exe.with_file_name(format!("{name}.old")), b"rtpm 0.9.0").unwrap();

    let outcome = updater(&release, &install, Installer::InPlaceSwap).run().await.unwrap();

    assert!(outcome.updated());
    assert_eq!(std::fs::read(&install.exe).unwrap(), b"rtpm 1.1.0");
}

#[cfg(unix)]
#[tokio::test]
async fn test_supervised_installer_runs_against_install_dir() {
    let bundle = release_bundle(b"rtpm 1.1.0", r#"echo "$2" > "$1/installer-ran""#);
    let release = MockRelease::publish_bundle("1.1.0", &bundle).await;
    let temp = TempDir::new().unwrap();
    let install = aged_install(temp.path(), b"rtpm 1.0.0");

    let outcome = updater(&release, &install, Installer::Supervised).run().await.unwrap();

    assert_eq!(
        outcome,
        AutoUpdateOutcome::Installed {
            version: "1.1.0".to_string(),
            outcome: InstallOutcome::Completed,
        }
    );
    let marker = std::fs::read_to_string(install.root.join("installer-ran")).unwrap();
    assert_eq!(marker.trim(), "--update");
    // The installer owns the binary; nothing was swapped
    assert_eq!(std::fs::read(&install.exe).unwrap(), b"rtpm 1.0.0");
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_installer_is_reported() {
    let bundle = release_bundle(b"rtpm 1.1.0", "exit 3");
    let release = MockRelease::publish_bundle("1.1.0", &bundle).await;
    let temp = TempDir::new().unwrap();
    let install = aged_install(temp.path(), b"rtpm 1.0.0");

    let error = updater(&release, &install, Installer::Supervised).run().await.unwrap_err();

    assert!(matches!(
        find_rtpm_error(&error),
        Some(RtpmError::InstallerFailed {
            code: Some(3)
        })
    ));
    assert!(format!("{error:#}").contains("Failed to install rtpm 1.1.0"));
}

#[tokio::test]
async fn test_checksum_mismatch_installs_nothing() {
    let bundle = release_bundle(b"rtpm 1.1.0", "exit 0");
    let release = MockRelease::publish_with_checksum("1.1.0", &bundle, &"0".repeat(64)).await;
    let temp = TempDir::new().unwrap();
    let install = aged_install(temp.path(), b"rtpm 1.0.0");

    let error = updater(&release, &install, Installer::InPlaceSwap).run().await.unwrap_err();

    assert!(is_integrity_error(&error));
    assert_eq!(std::fs::read(&install.exe).unwrap(), b"rtpm 1.0.0");
}

#[tokio::test]
async fn test_busy_lock_skips_the_download() {
    let release = MockRelease::publish("1.1.0", b"rtpm 1.1.0").await;
    let temp = TempDir::new().unwrap();
    let install = aged_install(temp.path(), b"rtpm 1.0.0");
    let held = UpdateLock::try_acquire(&install.root).await.unwrap().unwrap();

    let outcome = updater(&release, &install, Installer::InPlaceSwap).run().await.unwrap();

    assert_eq!(outcome, AutoUpdateOutcome::LockUnavailable);
    assert!(!release.archive.as_ref().unwrap().matched_async().await);
    assert_eq!(std::fs::read(&install.exe).unwrap(), b"rtpm 1.0.0");
    held.release();
}

#[tokio::test]
async fn test_legacy_update_waits_for_current_generation_lock() {
    let release = MockRelease::publish("1.1.0", b"rtpm 1.1.0").await;
    let temp = TempDir::new().unwrap();
    let install = aged_install(temp.path(), b"rtpm 1.0.0");
    let held = UpdateLock::try_acquire(&install.root).await.unwrap().unwrap();

    let legacy = LegacyUpdater::new(&release.settings(), &Origin::new("release", "1.0.0")).unwrap();
    let error = legacy.update(&install.exe).await.unwrap_err();

    assert!(matches!(find_rtpm_error(&error), Some(RtpmError::UpdateInProgress { .. })));
    assert_eq!(std::fs::read(&install.exe).unwrap(), b"rtpm 1.0.0");
    held.release();
}

#[tokio::test]
async fn test_concurrent_updaters_install_once() {
    let release = MockRelease::publish("1.1.0", b"rtpm 1.1.0").await;
    let temp = TempDir::new().unwrap();
    let install = aged_install(temp.path(), b"rtpm 1.0.0");

    let first = updater(&release, &install, Installer::InPlaceSwap);
    let second = updater(&release, &install, Installer::InPlaceSwap);
    let (a, b) = tokio::join!(first.run(), second.run());
    let outcomes = [a.unwrap(), b.unwrap()];

    let installed = outcomes.iter().filter(|o| o.updated()).count();
    assert!(installed >= 1, "at least one updater must install: {outcomes:?}");
    for outcome in &outcomes {
        assert!(
            outcome.updated() || *outcome == AutoUpdateOutcome::LockUnavailable,
            "unexpected outcome {outcome:?}"
        );
    }
    assert_eq!(std::fs::read(&install.exe).unwrap(), b"rtpm 1.1.0");
}

#[tokio::test]
async fn test_server_error_is_a_quiet_check_failure() {
    let release = MockRelease::failing(503).await;
    let temp = TempDir::new().unwrap();
    let install = aged_install(temp.path(), b"rtpm 1.0.0");

    let outcome = updater(&release, &install, Installer::InPlaceSwap).run().await.unwrap();

    assert_eq!(outcome, AutoUpdateOutcome::CheckFailed);
    assert!(!UpdateLock::lock_path(&install.root).exists());
}

#[tokio::test]
async fn test_disabled_env_skips_without_network() {
    let release = MockRelease::publish("1.1.0", b"rtpm 1.1.0").await;
    let temp = TempDir::new().unwrap();
    let install = aged_install(temp.path(), b"rtpm 1.0.0");
    let env = EnvOverrides {
        disable_updates: Some("true".to_string()),
        ..release.env()
    };
    let settings = release.settings();
    let checker = Checker::new(&settings, Origin::new("release", "1.0.0")).unwrap();
    let updater = AutoUpdater::new(
        checker,
        Fetcher::new().unwrap(),
        settings,
        env,
        install.exe.clone(),
        install.root.clone(),
    );

    let outcome = updater.run().await.unwrap();

    assert!(matches!(outcome, AutoUpdateOutcome::Skipped(_)));
    assert!(!release.info.matched_async().await);
}

#[tokio::test]
async fn test_cache_serves_update_to_orchestrator() {
    let release = MockRelease::publish("1.1.0", b"rtpm 1.1.0").await;
    let temp = TempDir::new().unwrap();
    let install = aged_install(temp.path(), b"rtpm 1.0.0");
    let settings = release.settings();

    let checker = Checker::new(&settings, Origin::new("release", "1.0.0")).unwrap();
    let cache = UpdateCache::spawn(checker, Duration::from_secs(3600));
    let mut snapshot = cache.snapshot().await.unwrap();
    for _ in 0..200 {
        if snapshot.refreshed_at.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        snapshot = cache.snapshot().await.unwrap();
    }
    assert_eq!(snapshot.update.as_ref().map(|u| u.version()), Some("1.1.0"));

    let updater = AutoUpdater::new(
        cache,
        Fetcher::new().unwrap(),
        settings,
        release.env(),
        install.exe.clone(),
        install.root.clone(),
    )
    .with_installer(Installer::InPlaceSwap);

    let outcome = updater.run().await.unwrap();
    assert_eq!(outcome.new_version(), "1.1.0");
    assert_eq!(std::fs::read(&install.exe).unwrap(), b"rtpm 1.1.0");
}
