//! Long-running update service.
//!
//! `rtpm service` keeps the update cache warm and, once an update shows up,
//! hands it to a detached installer and exits so the installer can replace
//! the binary. It stops on Ctrl-C.

use super::common::CommandContext;
use crate::constants::SERVICE_POLL_INTERVAL;
use crate::update::{
    AvailableUpdate, Checker, Fetcher, InstallOutcome, Installer, UpdateCache, UpdateInstaller,
    UpdateLock,
};
use anyhow::{Context, Result, bail};
use clap::Args;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Arguments of `rtpm service`.
#[derive(Args, Debug, Default)]
pub struct ServiceArgs {
    /// Seconds between looks at the update cache.
    #[arg(long, value_name = "SECONDS")]
    pub poll_interval: Option<u64>,
}

impl ServiceArgs {
    fn poll_interval(&self) -> Duration {
        self.poll_interval.filter(|s| *s > 0).map_or(SERVICE_POLL_INTERVAL, Duration::from_secs)
    }
}

pub async fn execute(args: ServiceArgs, ctx: &CommandContext) -> Result<()> {
    let install_enabled = ctx.settings.auto_update && !ctx.env.updates_disabled();
    let checker = Checker::new(&ctx.settings, ctx.origin.clone())?.with_source("service");
    let cache = UpdateCache::spawn(checker, ctx.settings.cache_refresh_interval);

    info!(
        origin = %ctx.origin,
        refresh_secs = ctx.settings.cache_refresh_interval.as_secs(),
        install_enabled,
        "Update service started"
    );

    let mut poll = tokio::time::interval(args.poll_interval());
    let mut notified: Option<String> = None;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Update service stopping");
                return Ok(());
            }
            _ = poll.tick() => {}
        }

        let Some(update) = cache.snapshot().await?.update else {
            continue;
        };

        if !install_enabled {
            if notified.as_deref() != Some(update.version()) {
                info!(version = update.version(), "Update available; automatic updates are off");
                notified = Some(update.version().to_string());
            }
            continue;
        }

        match start_installer(&update, ctx).await {
            Ok(Some(pid)) => {
                info!(pid, version = update.version(), "Handed update to installer, exiting");
                return Ok(());
            }
            Ok(None) => debug!("Another process is updating, will look again"),
            Err(e) => warn!(error = %format!("{e:#}"), "Failed to start installer"),
        }
    }
}

/// Starts a detached installer for `update`. `None` when the lock is taken.
///
/// The installer keeps holding the lock after this returns.
async fn start_installer(update: &AvailableUpdate, ctx: &CommandContext) -> Result<Option<u32>> {
    let Some(lock) = UpdateLock::try_acquire(&ctx.install_dir).await? else {
        return Ok(None);
    };

    let installer = UpdateInstaller::new(update, Fetcher::new()?, &ctx.install_dir, &ctx.exe);
    match installer.install(&lock, Installer::Detached).await? {
        InstallOutcome::Spawned {
            pid,
        } => Ok(Some(pid)),
        other => bail!("Unexpected outcome from detached installer: {other:?}"),
    }
}
