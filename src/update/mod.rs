//! Self-update engine for rtpm.
//!
//! Keeps an installed `rtpm` current without getting in the user's way. The
//! engine discovers updates through an info endpoint, downloads and verifies
//! the advertised archive, and hands the unpacked bundle to an installer while
//! holding a cross-process lock on the installation directory.
//!
//! # Architecture Overview
//!
//! - **[`Checker`]**: asks the info endpoint which update fits the running binary
//! - **[`Fetcher`]**: downloads an archive, checks its SHA-256 and unpacks it
//! - **[`UpdateLock`]**: non-blocking, crash-safe lock per installation directory
//! - **[`UpdateInstaller`]**: applies a fetched update with one of the [`Installer`] strategies
//! - **[`UpdateCache`]**: background actor serving the latest update info from memory
//! - **[`AutoUpdater`]**: the startup orchestrator deciding whether to check and install
//! - **[`LegacyUpdater`]**: the previous release layout, updated by swapping the binary
//!
//! ## Update Flow
//!
//! ```text
//! 1. Skip checks (project pin, CI, fresh install, ...)   no network
//! 2. Checker / UpdateCache -> AvailableUpdate            bounded by a deadline
//! 3. UpdateLock::try_acquire(install_dir)                losers skip silently
//! 4. Fetcher: download -> verify sha256 -> unpack        into a private temp dir
//! 5. Installer: detached | supervised | in-place swap
//! 6. Caller relaunches itself on the new binary
//! ```
//!
//! # Failure Policy
//!
//! Up to lock acquisition everything fails open: a slow server, a network
//! error or a busy lock means no update this time, and the user's command runs
//! as usual. Integrity failures (checksum mismatch, malformed info) are logged
//! at error level. After the lock is taken, errors are returned to the caller;
//! permission problems carry a dedicated remediation message.
//!
//! # Example
//!
//! ```rust,no_run
//! use rtpm_cli::update::{
//!     AutoUpdater, Checker, EnvOverrides, Fetcher, Origin, UpdateConfig, UpdateSettings,
//! };
//! use std::path::PathBuf;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let env = EnvOverrides::from_env();
//! let settings = UpdateSettings::resolve(&UpdateConfig::default(), &env);
//! let checker = Checker::new(&settings, Origin::current())?;
//! let exe = PathBuf::from("/opt/rtpm/bin/rtpm");
//! let updater = AutoUpdater::new(
//!     checker,
//!     Fetcher::new()?,
//!     settings,
//!     env,
//!     exe,
//!     PathBuf::from("/opt/rtpm"),
//! );
//!
//! let outcome = updater.run().await?;
//! if outcome.updated() {
//!     println!("updated to {}", outcome.new_version());
//! }
//! # Ok(())
//! # }
//! ```

/// Platform archive formats and file disposal.
pub mod archive;
/// Startup orchestration of automatic updates.
pub mod auto;
/// Background cache actor for update info.
pub mod cache;
/// Update discovery against the info endpoint.
pub mod checker;
/// `[update]` configuration and environment overrides.
pub mod config;
/// Download, checksum gate and unpacking of update archives.
pub mod fetcher;
/// Applying fetched updates.
pub mod installer;
/// Updates from the legacy release layout.
pub mod legacy;
/// Cross-process installation lock.
pub mod lock;
/// Running origin and offered updates.
pub mod model;
/// Sources of current update info.
pub mod provider;
/// In-place replacement of the running binary.
pub mod swap;
/// SHA-256 verification of downloads.
pub mod verification;


pub use archive::{NativePlatform, PlatformOps};
pub use auto::{AutoUpdateOutcome, AutoUpdater, SkipReason};
pub use cache::{UpdateCache, UpdateCacheHandle, UpdateSnapshot};
pub use checker::Checker;
pub use config::{EnvOverrides, InstallStrategy, UpdateConfig, UpdateSettings};
pub use fetcher::Fetcher;
pub use installer::{InstallOutcome, Installer, UpdateInstaller};
pub use legacy::{LegacyOutcome, LegacyUpdater};
pub use lock::UpdateLock;
pub use model::{AvailableUpdate, Origin, UpdateInfo};
pub use provider::UpdateInfoProvider;
pub use swap::{BinarySwap, cleanup_old_binary};
pub use verification::ChecksumVerifier;
