//! Command-line interface for rtpm.
//!
//! # Commands
//!
//! - `update` - Check for and install a new rtpm version
//! - `service` - Keep the update cache warm and update in the background
//! - `status` - Show the installed version and what is available
//!
//! # Global Options
//!
//! - `--verbose` - Enable debug output
//! - `--quiet` - Only show errors
//! - `--config <PATH>` - Use an alternative global config file
//! - `--no-progress` - Disable spinners
//!
//! # Automatic Updates
//!
//! Before any command other than `update` and `service` runs, the CLI gives
//! the [`AutoUpdater`] a chance to install a new version. When it does, the
//! new binary is started with the same arguments and its exit code becomes
//! this process's exit code. Failures never prevent the command from running.
//!
//! ```bash
//! rtpm status                          # may update first, then shows status
//! RTPM_DISABLE_UPDATES=true rtpm status
//! rtpm --verbose update --check
//! ```

mod common;
mod service;
mod status;
mod update;

pub use common::CommandContext;
pub use service::ServiceArgs;
pub use status::StatusArgs;
pub use update::UpdateArgs;

use crate::config::ProjectConfig;
use crate::constants::env;
use crate::core::user_friendly_error;
use crate::update::{AutoUpdateOutcome, AutoUpdater, Checker, Fetcher};
use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

/// Runtime configuration derived from the global flags.
///
/// Flags that other parts of the program read from the environment are
/// exported once, before the async runtime starts.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Default log filter when `RUST_LOG` is not set.
    pub log_level: &'static str,
    pub no_progress: bool,
    /// Custom path to the global configuration file.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Exports `RTPM_NO_PROGRESS` and `RTPM_CONFIG` as requested.
    ///
    /// # Safety
    ///
    /// Mutates the process environment; no other thread may be running.
    pub unsafe fn apply_to_env(&self) {
        if self.no_progress {
            unsafe { std::env::set_var(env::NO_PROGRESS, "1") };
        }
        if let Some(path) = &self.config_path {
            unsafe { std::env::set_var(env::CONFIG, path) };
        }
    }
}

/// rtpm: a self-updating command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "rtpm",
    about = "rtpm - runtime package manager with automatic self-update",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output for debugging.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the global configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable progress spinners.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check for and install a new version of rtpm.
    Update(UpdateArgs),
    /// Run the background update service.
    Service(ServiceArgs),
    /// Show the installed version and update status.
    Status(StatusArgs),
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Update(_) => "update",
            Self::Service(_) => "service",
            Self::Status(_) => "status",
        }
    }
}

impl Cli {
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    /// Runs the command and returns the process exit code.
    pub async fn execute(self) -> Result<i32> {
        let ctx = CommandContext::load().await?;

        if !matches!(self.command, Commands::Update(_) | Commands::Service(_))
            && let Some(code) = auto_update(&ctx, self.command.name()).await
        {
            return Ok(code);
        }

        match self.command {
            Commands::Update(args) => update::execute(args, &ctx).await?,
            Commands::Service(args) => service::execute(args, &ctx).await?,
            Commands::Status(args) => status::execute(args, &ctx).await?,
        }
        Ok(0)
    }
}

/// Gives the auto-updater a chance to run before `command`.
///
/// Returns the exit code of the relaunched binary when an update was installed.
async fn auto_update(ctx: &CommandContext, command: &str) -> Option<i32> {
    let outcome = match run_auto_update(ctx, command).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{}", "Automatic update failed:".yellow());
            user_friendly_error(e).display();
            return None;
        }
    };

    match &outcome {
        AutoUpdateOutcome::Disabled {
            version,
        } => {
            common::print_update_notice(&ctx.origin.version, version);
            None
        }
        AutoUpdateOutcome::Installed {
            version,
            ..
        } => {
            eprintln!("{}", format!("Updated rtpm to {version}").green());
            match common::relaunch(&ctx.exe).await {
                Ok(code) => Some(code),
                Err(e) => {
                    user_friendly_error(e).display();
                    None
                }
            }
        }
        other => {
            debug!(outcome = ?other, "No automatic update");
            None
        }
    }
}

async fn run_auto_update(ctx: &CommandContext, command: &str) -> Result<AutoUpdateOutcome> {
    let project_pin = std::env::current_dir()
        .ok()
        .and_then(|cwd| ProjectConfig::pinned_version(&cwd));

    let checker = Checker::new(&ctx.settings, ctx.origin.clone())?;
    let updater = AutoUpdater::new(
        checker,
        Fetcher::new()?,
        ctx.settings.clone(),
        ctx.env.clone(),
        ctx.exe.clone(),
        ctx.install_dir.clone(),
    )
    .with_command(Some(command.to_string()))
    .with_project_pin(project_pin);

    updater.run().await
}
