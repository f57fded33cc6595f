//! Interactive self-update.
//!
//! `rtpm update` checks the update server, then installs the offered version
//! while holding the installation lock. Unlike the automatic update at
//! startup, every failure is reported, including a busy lock.
//!
//! ```bash
//! rtpm update                         # install the latest version
//! rtpm update --check                 # only report what is available
//! rtpm update --channel beta          # switch channels
//! rtpm update --target-version 1.4.2  # install a specific version
//! rtpm update --in-place              # swap the binary instead of running the installer
//! rtpm update --legacy                # update from the legacy release layout
//! ```

use super::common::CommandContext;
use crate::core::RtpmError;
use crate::update::{
    Checker, Fetcher, InstallOutcome, InstallStrategy, Installer, LegacyOutcome, LegacyUpdater,
    UpdateInstaller, UpdateLock,
};
use crate::utils::Spinner;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::debug;

/// Arguments of `rtpm update`.
#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Check for updates without installing.
    #[arg(long)]
    pub check: bool,

    /// Release channel to update from (defaults to the configured or current channel).
    #[arg(long, value_name = "CHANNEL")]
    pub channel: Option<String>,

    /// Install this version instead of the latest one.
    #[arg(long = "target-version", value_name = "VERSION")]
    pub target_version: Option<String>,

    /// Replace the running binary directly instead of running the installer.
    #[arg(long, conflicts_with = "legacy")]
    pub in_place: bool,

    /// Update from the legacy release layout.
    #[arg(long)]
    pub legacy: bool,
}

impl UpdateArgs {
    fn installer(&self, ctx: &CommandContext) -> Installer {
        if self.in_place || ctx.settings.strategy == InstallStrategy::InPlace {
            Installer::InPlaceSwap
        } else {
            Installer::Supervised
        }
    }
}

pub async fn execute(args: UpdateArgs, ctx: &CommandContext) -> Result<()> {
    if args.legacy {
        return legacy_update(&args, ctx).await;
    }

    let checker = Checker::new(&ctx.settings, ctx.origin.clone())?;
    let spinner = Spinner::start("Checking for updates...");
    let result = checker.check_for(args.channel.as_deref(), args.target_version.as_deref()).await;
    spinner.finish_and_clear();

    let Some(update) = result? else {
        println!(
            "{}",
            format!("You are on the latest version ({})", ctx.origin.version).green()
        );
        return Ok(());
    };

    if args.check {
        println!(
            "{}",
            format!("Update available: {} -> {}", ctx.origin.version, update.version()).green()
        );
        println!("Run `rtpm update` to install it");
        return Ok(());
    }

    let Some(lock) = UpdateLock::try_acquire(&ctx.install_dir).await? else {
        return Err(RtpmError::UpdateInProgress {
            lock_path: UpdateLock::lock_path(&ctx.install_dir).display().to_string(),
        }
        .into());
    };

    let strategy = args.installer(ctx);
    debug!(strategy = ?strategy, "Selected installer");
    println!("{}", format!("Updating to {}...", update).cyan());

    let installer = UpdateInstaller::new(&update, Fetcher::new()?, &ctx.install_dir, &ctx.exe);
    match installer.install(&lock, strategy).await? {
        InstallOutcome::Spawned {
            pid,
        } => println!("Installer started (pid {pid})"),
        InstallOutcome::Completed | InstallOutcome::Swapped(_) => {
            println!("{}", format!("Updated rtpm to {}", update.version()).green());
        }
    }
    lock.release();
    Ok(())
}

async fn legacy_update(args: &UpdateArgs, ctx: &CommandContext) -> Result<()> {
    let mut updater = LegacyUpdater::new(&ctx.settings, &ctx.origin)?
        .with_desired_version(args.target_version.clone());
    if let Some(channel) = &args.channel {
        updater = updater.with_channel(channel);
    }

    if args.check {
        match updater.available().await? {
            Some(info) => {
                println!(
                    "{}",
                    format!("Update available: {} -> {}", ctx.origin.version, info.version).green()
                );
            }
            None => println!(
                "{}",
                format!("You are on the latest version ({})", ctx.origin.version).green()
            ),
        }
        return Ok(());
    }

    let spinner = Spinner::start("Updating from the legacy release channel...");
    let result = updater.update(&ctx.exe).await;
    spinner.finish_and_clear();

    match result? {
        LegacyOutcome::UpToDate => println!(
            "{}",
            format!("You are on the latest version ({})", ctx.origin.version).green()
        ),
        LegacyOutcome::Updated {
            version,
            ..
        } => println!("{}", format!("Updated rtpm to {version}").green()),
    }
    Ok(())
}
