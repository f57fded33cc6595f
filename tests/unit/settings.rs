//! Configuration files and environment overrides.

use rtpm_cli::config::{GlobalConfig, ProjectConfig};
use rtpm_cli::update::{EnvOverrides, InstallStrategy, UpdateConfig, UpdateSettings};
use serial_test::serial;
use std::time::Duration;
use tempfile::TempDir;

/// Sets `vars` for the duration of `f` and restores the previous values.
fn with_env<T>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
    let saved: Vec<_> = vars.iter().map(|(key, _)| (*key, std::env::var_os(key))).collect();
    for (key, value) in vars {
        // SAFETY: callers are #[serial], no other test thread touches the environment
        unsafe {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
    let result = f();
    for (key, value) in saved {
        // SAFETY: as above
        unsafe {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
    result
}

#[test]
#[serial]
fn test_env_overrides_from_process_environment() {
    let env = with_env(
        &[
            ("RTPM_UPDATE_INFO_URL", Some("http://127.0.0.1:4000")),
            ("RTPM_UPDATE_CHANNEL", Some("beta")),
            ("RTPM_UPDATE_TIMEOUT_MS", Some("50")),
            ("RTPM_DISABLE_UPDATES", Some("true")),
            ("RTPM_UPDATE_URL", Some("")),
        ],
        EnvOverrides::from_env,
    );

    assert_eq!(env.info_url.as_deref(), Some("http://127.0.0.1:4000"));
    assert_eq!(env.channel.as_deref(), Some("beta"));
    assert_eq!(env.timeout_ms, Some(50));
    assert!(env.updates_disabled());
    assert_eq!(env.file_url, None, "empty values count as unset");
}

#[test]
#[serial]
fn test_config_path_from_environment() {
    let path = with_env(&[("RTPM_CONFIG", Some("/tmp/custom-rtpm.toml"))], GlobalConfig::config_path);
    assert_eq!(path.unwrap(), std::path::PathBuf::from("/tmp/custom-rtpm.toml"));

    let path = with_env(&[("RTPM_CONFIG", None)], GlobalConfig::config_path).unwrap();
    assert!(path.ends_with("config.toml"));
}

#[tokio::test]
async fn test_global_config_drives_settings() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[update]
auto_update = false
check_timeout_ms = 300
strategy = "in-place"
channel = "beta"
"#,
    )
    .unwrap();

    let config = GlobalConfig::load_from(&path).await.unwrap();
    let env = EnvOverrides {
        channel: Some("nightly".to_string()),
        ..EnvOverrides::default()
    };
    let settings = UpdateSettings::resolve(&config.update, &env);

    assert!(!settings.auto_update);
    assert_eq!(settings.strategy, InstallStrategy::InPlace);
    assert_eq!(settings.check_timeout, Duration::from_millis(300));
    assert_eq!(settings.channel.as_deref(), Some("nightly"));
}

#[tokio::test]
async fn test_missing_global_config_uses_defaults() {
    let temp = TempDir::new().unwrap();
    let config =
        GlobalConfig::load_with_optional(Some(temp.path().join("absent.toml"))).await.unwrap();
    assert_eq!(config.update, UpdateConfig::default());
}

#[tokio::test]
async fn test_saved_config_omits_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.toml");

    GlobalConfig::default().save_to(&path).await.unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(!written.contains("[update]"), "unexpected content: {written}");

    let mut config = GlobalConfig::default();
    config.update.rollout_tag = Some("canary".to_string());
    config.save_to(&path).await.unwrap();
    let reloaded = GlobalConfig::load_from(&path).await.unwrap();
    assert_eq!(reloaded.update.rollout_tag.as_deref(), Some("canary"));
}

#[test]
fn test_project_pin_found_from_subdirectory() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("rtpm.toml"), "[tool]\nversion = \"2.1.0\"\n").unwrap();
    let nested = temp.path().join("src").join("deep");
    std::fs::create_dir_all(&nested).unwrap();

    assert_eq!(ProjectConfig::pinned_version(&nested).as_deref(), Some("2.1.0"));
    assert_eq!(ProjectConfig::find_path(&nested), Some(temp.path().join("rtpm.toml")));
}

#[test]
fn test_project_without_pin() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("rtpm.toml"), "[tool]\n").unwrap();
    assert_eq!(ProjectConfig::pinned_version(temp.path()), None);
}
