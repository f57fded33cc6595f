//! rtpm command-line entry point.

use anyhow::{Context, Result};
use clap::Parser;
use rtpm_cli::cli::Cli;
use rtpm_cli::core::user_friendly_error;
use rtpm_cli::update::cleanup_old_binary;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.build_config();

    // SAFETY: the async runtime has not started, this is the only thread
    unsafe { config.apply_to_env() };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rtpm_cli={0},rtpm={0}", config.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    if let Ok(exe) = rtpm_cli::utils::current_exe() {
        cleanup_old_binary(&exe);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match runtime.block_on(cli.execute()) {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
