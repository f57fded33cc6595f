//! `rtpm status`: what is installed where, and what is available.

use super::common::CommandContext;
use crate::update::{Checker, UpdateLock};
use crate::utils::platform_id;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

/// Arguments of `rtpm status`.
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Print machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    version: String,
    channel: String,
    platform: String,
    executable: String,
    install_dir: String,
    auto_update: bool,
    update_in_progress: bool,
    latest_version: Option<String>,
    check_error: Option<String>,
}

pub async fn execute(args: StatusArgs, ctx: &CommandContext) -> Result<()> {
    let report = build_report(ctx).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("rtpm {} ({})", report.version.bold(), report.channel);
    println!("  platform:     {}", report.platform);
    println!("  executable:   {}", report.executable);
    println!("  install dir:  {}", report.install_dir);
    println!(
        "  auto-update:  {}",
        if report.auto_update { "enabled".green() } else { "disabled".yellow() }
    );
    if report.update_in_progress {
        println!("  {}", "an update is currently being installed".yellow());
    }
    match (&report.latest_version, &report.check_error) {
        (Some(latest), _) => {
            println!("  latest:       {} {}", latest, "(update available)".green());
        }
        (None, Some(error)) => println!("  latest:       unknown ({error})"),
        (None, None) => println!("  latest:       {} (up to date)", report.version),
    }
    Ok(())
}

async fn build_report(ctx: &CommandContext) -> Result<StatusReport> {
    let checker = Checker::new(&ctx.settings, ctx.origin.clone())?;
    let (latest_version, check_error) = match checker.check_for(None, None).await {
        Ok(update) => (update.map(|u| u.version().to_string()), None),
        Err(e) => {
            debug!(error = %format!("{e:#}"), "Update check failed");
            (None, Some(e.to_string()))
        }
    };

    // Probing the lock takes it for an instant; release it right away
    let update_in_progress = match UpdateLock::try_acquire(&ctx.install_dir).await {
        Ok(Some(lock)) => {
            lock.release();
            false
        }
        Ok(None) => true,
        Err(e) => {
            debug!(error = %e, "Could not check the update lock");
            false
        }
    };

    Ok(StatusReport {
        version: ctx.origin.version.clone(),
        channel: ctx.origin.channel.clone(),
        platform: platform_id(),
        executable: ctx.exe.display().to_string(),
        install_dir: ctx.install_dir.display().to_string(),
        auto_update: ctx.settings.auto_update && !ctx.env.updates_disabled(),
        update_in_progress,
        latest_version,
        check_error,
    })
}
