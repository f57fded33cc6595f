//! Shared helpers for the rtpm test suites.
//!
//! Provides a mock release server, an isolated environment for running the
//! `rtpm` binary and a few filesystem helpers.
#![allow(dead_code)]

use assert_cmd::Command;
use mockito::{Matcher, Mock, ServerGuard};
use rtpm_cli::test_utils::{ArchiveEntry, InstallFixture, native_archive, sha256_hex};
use rtpm_cli::update::{EnvOverrides, UpdateConfig, UpdateSettings};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Version compiled into the binary under test.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A release published on a mock update server.
///
/// The info endpoint lives at `<url>/info` and archives under `<url>/files`.
pub struct MockRelease {
    pub server: ServerGuard,
    pub info: Mock,
    pub archive: Option<Mock>,
    pub version: String,
    pub path: String,
}

impl MockRelease {
    /// Publishes `version` with a bundle holding `binary` and an installer script.
    pub async fn publish(version: &str, binary: &[u8]) -> Self {
        Self::publish_bundle(version, &release_bundle(binary, "exit 0")).await
    }

    /// Publishes `version` with an arbitrary bundle.
    pub async fn publish_bundle(version: &str, bundle: &[u8]) -> Self {
        Self::publish_with_checksum(version, bundle, &sha256_hex(bundle)).await
    }

    /// Publishes `version` while advertising `sha256` for the bundle.
    pub async fn publish_with_checksum(version: &str, bundle: &[u8], sha256: &str) -> Self {
        let mut server = mockito::Server::new_async().await;
        let (path, body) = release_info(version, sha256);
        let info = server
            .mock("GET", "/info")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        let archive = server
            .mock("GET", format!("/files/{path}").as_str())
            .with_status(200)
            .with_body(bundle)
            .create_async()
            .await;

        Self {
            server,
            info,
            archive: Some(archive),
            version: version.to_string(),
            path,
        }
    }

    /// Blocking variant of [`MockRelease::publish`] for tests without a runtime.
    pub fn publish_blocking(version: &str, binary: &[u8]) -> Self {
        let bundle = release_bundle(binary, "exit 0");
        let mut server = mockito::Server::new();
        let (path, body) = release_info(version, &sha256_hex(&bundle));
        let info = server
            .mock("GET", "/info")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create();
        let archive = server
            .mock("GET", format!("/files/{path}").as_str())
            .with_status(200)
            .with_body(bundle)
            .create();

        Self {
            server,
            info,
            archive: Some(archive),
            version: version.to_string(),
            path,
        }
    }

    /// An info endpoint that only ever answers with `status`.
    pub async fn failing(status: usize) -> Self {
        let mut server = mockito::Server::new_async().await;
        let info = server
            .mock("GET", "/info")
            .match_query(Matcher::Any)
            .with_status(status)
            .create_async()
            .await;
        Self {
            server,
            info,
            archive: None,
            version: String::new(),
            path: String::new(),
        }
    }

    pub fn info_url(&self) -> String {
        self.server.url()
    }

    pub fn file_url(&self) -> String {
        format!("{}/files", self.server.url())
    }

    /// Update settings pointing at this server.
    pub fn settings(&self) -> UpdateSettings {
        UpdateSettings::resolve(&UpdateConfig::default(), &self.env())
    }

    /// Environment overrides pointing at this server.
    pub fn env(&self) -> EnvOverrides {
        EnvOverrides {
            info_url: Some(self.info_url()),
            file_url: Some(self.file_url()),
            ..EnvOverrides::default()
        }
    }
}

/// Archive path and info body advertised for `version`.
fn release_info(version: &str, sha256: &str) -> (String, String) {
    let path = format!("release/{version}/rtpm{}", archive_suffix());
    let body = serde_json::json!({
        "channel": "release",
        "version": version,
        "platform": rtpm_cli::utils::platform_id(),
        "path": path,
        "sha256": sha256,
    });
    (path, body.to_string())
}

/// Bundle layout of a release: an installer script plus `bin/rtpm`.
pub fn release_bundle(binary: &[u8], installer_body: &str) -> Vec<u8> {
    let script = format!("#!/bin/sh\n{installer_body}\n");
    native_archive(&[
        ArchiveEntry::executable(
            &rtpm_cli::utils::executable_name("rtpm-installer"),
            script.as_bytes(),
        ),
        ArchiveEntry::executable(&format!("bin/{}", rtpm_cli::utils::executable_name("rtpm")), binary),
    ])
}

fn archive_suffix() -> &'static str {
    if cfg!(windows) { ".zip" } else { ".tar.gz" }
}

/// An installation whose binary is old enough not to count as fresh.
pub fn aged_install(root: &Path, contents: &[u8]) -> InstallFixture {
    let fixture = InstallFixture::create(root, contents);
    std::fs::File::options()
        .write(true)
        .open(&fixture.exe)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(7 * 24 * 60 * 60))
        .unwrap();
    fixture
}

/// Isolated environment for running the `rtpm` binary.
///
/// Every command gets its own global config file and a project directory as
/// working directory, so nothing from the developer machine leaks in.
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub project_dir: PathBuf,
    pub config_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let project_dir = temp_dir.path().join("project");
        std::fs::create_dir_all(&project_dir).unwrap();
        let config_path = temp_dir.path().join("config.toml");
        Self {
            temp_dir,
            project_dir,
            config_path,
        }
    }

    /// Writes the global config file.
    pub fn write_config(&self, contents: &str) {
        std::fs::write(&self.config_path, contents).unwrap();
    }

    /// Writes `rtpm.toml` into the project directory.
    pub fn write_project(&self, contents: &str) {
        std::fs::write(self.project_dir.join("rtpm.toml"), contents).unwrap();
    }

    /// `rtpm` with automatic updates skipped and all update URLs unroutable.
    pub fn rtpm_command(&self) -> Command {
        let mut cmd = Command::cargo_bin("rtpm").unwrap();
        cmd.current_dir(&self.project_dir)
            .env("RTPM_CONFIG", &self.config_path)
            .env("RTPM_TESTING", "1")
            .env("RTPM_NO_PROGRESS", "1")
            .env("RTPM_UPDATE_INFO_URL", "http://127.0.0.1:9")
            .env("RTPM_UPDATE_URL", "http://127.0.0.1:9")
            .env("RTPM_LEGACY_UPDATE_URL", "http://127.0.0.1:9")
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("RTPM_FORWARDED")
            .env_remove("RTPM_DISABLE_UPDATES")
            .env_remove("RTPM_FORCE_UPDATE");
        cmd
    }

    /// `rtpm` talking to `release` for update information.
    pub fn rtpm_command_for(&self, release: &MockRelease) -> Command {
        let mut cmd = self.rtpm_command();
        cmd.env("RTPM_UPDATE_INFO_URL", release.info_url())
            .env("RTPM_UPDATE_URL", release.file_url());
        cmd
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
