//! Cross-process update lock.
//!
//! Only one process may install into a given installation directory at a time.
//! The lock is an OS-level exclusive lock on `<dir>/install.lock`, so it is
//! released by the operating system when the holder exits or crashes.
//!
//! Acquisition never waits: a second updater learns immediately that someone
//! else is busy and skips its attempt.
//!
//! A detached installer keeps running after its caller exits. On Unix it
//! inherits the locked handle through [`UpdateLock::share_with`], so the
//! directory stays locked until the installer is done too.
//!
//! # Async Safety
//!
//! File operations run in `spawn_blocking` so the tokio runtime is never blocked.

use crate::constants::{UPDATE_LOCK_FILE, env};
use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Exclusive ownership of one installation directory.
///
/// Dropping the lock releases it. The lock file itself stays in place: removing
/// it while another process has it open would let two processes lock
/// different files of the same name.
///
/// # Example
///
/// ```rust,no_run
/// use rtpm_cli::update::lock::UpdateLock;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// match UpdateLock::try_acquire(Path::new("/opt/rtpm")).await? {
///     Some(lock) => {
///         // install...
///         lock.release();
///     }
///     None => println!("another update is running"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct UpdateLock {
    /// Open handle holding the OS lock; `None` once released
    file: Option<File>,
    /// Path to the lock file for tracing
    path: PathBuf,
    /// A child process holds a copy of the handle; unlocking would free it for
    /// the child as well, so release only closes ours
    shared: AtomicBool,
}

impl UpdateLock {
    /// Path of the lock file guarding `dir`.
    #[must_use]
    pub fn lock_path(dir: &Path) -> PathBuf {
        dir.join(UPDATE_LOCK_FILE)
    }

    /// Tries once to lock `dir`.
    ///
    /// Returns `Ok(None)` when another process holds the lock. Creates `dir`
    /// when missing. Errors only when the lock file cannot be opened.
    pub async fn try_acquire(dir: &Path) -> Result<Option<Self>> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || Self::try_acquire_blocking(&dir))
            .await
            .context("spawn_blocking panicked")?
    }

    /// Blocking variant of [`UpdateLock::try_acquire`].
    pub fn try_acquire_blocking(dir: &Path) -> Result<Option<Self>> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create installation directory: {}", dir.display()))?;

        let path = Self::lock_path(dir);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(true) => {}
            Ok(false) => {
                debug!(lock_path = %path.display(), "Update lock held by another process");
                return Ok(None);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                debug!(lock_path = %path.display(), "Update lock held by another process");
                return Ok(None);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to lock {}", path.display()));
            }
        }

        if let Err(e) = write_owner(&file) {
            debug!(lock_path = %path.display(), error = %e, "Failed to record lock owner");
        }
        debug!(lock_path = %path.display(), pid = std::process::id(), "Update lock acquired");

        Ok(Some(Self {
            file: Some(file),
            path,
            shared: AtomicBool::new(false),
        }))
    }

    /// Path of the held lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the lock is still held by this value.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Lets the process started by `command` share this lock.
    ///
    /// The child learns the lock file path from `RTPM_INSTALL_LOCK`. On Unix it
    /// also inherits the locked handle, and the lock stays held until this
    /// value is released and the child has exited. Windows does not carry
    /// file locks across processes, so there the child has to lock the path
    /// itself.
    pub fn share_with(&self, command: &mut std::process::Command) {
        command.env(env::INSTALL_LOCK, &self.path);
        #[cfg(unix)]
        self.inherit_handle(command);
    }

    #[cfg(unix)]
    fn inherit_handle(&self, command: &mut std::process::Command) {
        use std::os::fd::AsRawFd;
        use std::os::unix::process::CommandExt;

        let Some(file) = &self.file else {
            return;
        };
        let fd = file.as_raw_fd();
        // SAFETY: only fcntl runs between fork and exec, which is async-signal-safe
        unsafe {
            command.pre_exec(move || {
                let flags = libc::fcntl(fd, libc::F_GETFD);
                if flags == -1 || libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self.shared.store(true, Ordering::SeqCst);
    }

    /// Releases the lock now. Calling it again, or dropping afterwards, is a no-op.
    pub fn release(mut self) {
        self.unlock();
    }

    fn unlock(&mut self) {
        if let Some(file) = self.file.take() {
            if self.shared.load(Ordering::SeqCst) {
                debug!(lock_path = %self.path.display(), "Update lock left to child process");
                return;
            }
            if let Err(e) = FileExt::unlock(&file) {
                debug!(lock_path = %self.path.display(), error = %e, "Failed to unlock update lock");
            }
            debug!(lock_path = %self.path.display(), "Update lock released");
        }
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        self.unlock();
    }
}

/// Records the owning process id in the lock file for diagnostics.
fn write_owner(mut file: &File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.sync_data()
}
