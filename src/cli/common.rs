//! Common utilities for CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::GlobalConfig;
use crate::constants::env;
use crate::update::{EnvOverrides, Origin, UpdateSettings};
use crate::utils::{current_exe, install_dir_from_exe};

/// Everything a command needs to know about this installation and its settings.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: GlobalConfig,
    pub env: EnvOverrides,
    pub settings: UpdateSettings,
    pub origin: Origin,
    /// The running binary.
    pub exe: PathBuf,
    /// Directory the binary was installed into.
    pub install_dir: PathBuf,
}

impl CommandContext {
    /// Loads the global config and snapshots the environment.
    pub async fn load() -> Result<Self> {
        let config = GlobalConfig::load().await?;
        let env = EnvOverrides::from_env();
        let exe = current_exe()?;
        let install_dir = install_dir_from_exe(&exe)?;
        Ok(Self::new(config, env, exe, install_dir))
    }

    pub fn new(config: GlobalConfig, env: EnvOverrides, exe: PathBuf, install_dir: PathBuf) -> Self {
        let settings = UpdateSettings::resolve(&config.update, &env);
        Self {
            config,
            env,
            settings,
            origin: Origin::current(),
            exe,
            install_dir,
        }
    }
}

/// Tells the user an update exists but was not installed.
pub fn print_update_notice(current: &str, available: &str) {
    eprintln!(
        "{}",
        format!("A new version of rtpm is available: {current} -> {available}").yellow()
    );
    eprintln!("Run {} to install it.", "rtpm update".cyan());
}

/// Runs `exe` again with this process's arguments and returns its exit code.
///
/// The child is marked as forwarded so it does not try to update again.
pub async fn relaunch(exe: &Path) -> Result<i32> {
    let args: Vec<_> = std::env::args_os().skip(1).collect();
    debug!(exe = %exe.display(), "Relaunching updated binary");

    let status = tokio::process::Command::new(exe)
        .args(&args)
        .env(env::FORWARDED, "true")
        .status()
        .await
        .with_context(|| format!("Failed to relaunch {}", exe.display()))?;

    Ok(status.code().unwrap_or(1))
}
