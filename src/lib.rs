//! rtpm - a command-line tool that keeps itself up to date.
//!
//! The heart of this crate is the self-update engine in [`update`]: it finds
//! the release that fits the running binary, downloads and verifies it, and
//! installs it under a cross-process lock, either through the bundled
//! installer or by swapping the binary in place.
//!
//! # Modules
//!
//! - [`update`] - discovery, download, locking, installation and orchestration
//! - [`config`] - global (`~/.rtpm/config.toml`) and project (`rtpm.toml`) configuration
//! - [`cli`] - the `rtpm` command-line interface
//! - [`core`] - error types and user-facing error formatting
//! - [`utils`] - platform helpers and progress indicators
//! - [`constants`] - names, URLs, timeouts and environment variables
//!
//! # Environment
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `RTPM_DISABLE_UPDATES` | `true` turns automatic updates off; `false` re-enables them on CI |
//! | `RTPM_FORCE_UPDATE` | reinstall even when the offered version is the running one |
//! | `RTPM_UPDATE_TIMEOUT_MS` | deadline of the automatic update check |
//! | `RTPM_UPDATE_CHANNEL` | release channel to follow |
//! | `RTPM_UPDATE_INFO_URL` / `RTPM_UPDATE_URL` | update info and archive base URLs |
//! | `RTPM_CONFIG` | alternative global config file |
//!
//! # Example
//!
//! ```rust,no_run
//! use rtpm_cli::update::{Checker, EnvOverrides, Origin, UpdateConfig, UpdateSettings};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = UpdateSettings::resolve(&UpdateConfig::default(), &EnvOverrides::from_env());
//! let checker = Checker::new(&settings, Origin::current())?;
//! match checker.check_for(None, None).await? {
//!     Some(update) => println!("update available: {update}"),
//!     None => println!("up to date"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod update;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
