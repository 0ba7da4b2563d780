//! Per-application instance guard.
//!
//! At most one updater process may run for a given application identity. The
//! guard is an OS advisory lock on a file named after the identity, so two
//! different applications never block each other and a crashed process never
//! leaves a stale lock behind (the OS drops the lock with the file handle).
//!
//! Acquisition is a single non-blocking attempt. Losing the race is reported
//! as [`UpdateError::AlreadyRunning`] and is meant to be fatal for the caller.

use crate::constants::{HOST_LOCK_PREFIX, RUNNER_LOCK_PREFIX};
use crate::core::UpdateError;
use crate::layout::AppIdentity;
use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which party the lock protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    /// An updater process (`download` or `update`).
    Runner,
    /// A running host application that integrates the updater.
    Host,
}

impl LockScope {
    fn prefix(self) -> &'static str {
        match self {
            Self::Runner => RUNNER_LOCK_PREFIX,
            Self::Host => HOST_LOCK_PREFIX,
        }
    }
}

/// Default directory for lock files: `<temp>/stagehand-locks`.
pub fn default_lock_dir() -> PathBuf {
    std::env::temp_dir().join("stagehand-locks")
}

/// Exclusive handle for one application identity; released on drop.
#[derive(Debug)]
pub struct InstanceGuard {
    file: File,
    path: PathBuf,
    identity: String,
}

impl InstanceGuard {
    /// Try once to become the only process of `scope` for `identity`.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::AlreadyRunning`] if another process holds the lock
    /// - IO errors if the lock directory or file cannot be created
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use stagehand::guard::{InstanceGuard, LockScope, default_lock_dir};
    /// use stagehand::layout::AppIdentity;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let identity = AppIdentity::new("Acme", "Widget");
    /// let _guard = InstanceGuard::acquire(&default_lock_dir(), &identity, LockScope::Runner)?;
    /// // ... the lock is held until `_guard` is dropped
    /// # Ok(())
    /// # }
    /// ```
    pub fn acquire(lock_dir: &Path, identity: &AppIdentity, scope: LockScope) -> Result<Self> {
        std::fs::create_dir_all(lock_dir).with_context(|| {
            format!("Failed to create lock directory: {}", lock_dir.display())
        })?;

        let lock_path = lock_dir.join(format!("{}.lock", identity.lock_name(scope.prefix())));

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        match file.try_lock_exclusive() {
            Ok(true) => {}
            Ok(false) => {
                return Err(UpdateError::AlreadyRunning {
                    identity: identity.to_string(),
                }
                .into());
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(UpdateError::AlreadyRunning {
                    identity: identity.to_string(),
                }
                .into());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to lock {}", lock_path.display())
                });
            }
        }

        // Owner pid, for whoever finds the lock file while debugging
        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;

        debug!(identity = %identity, lock = %lock_path.display(), "Instance lock acquired");

        Ok(Self {
            file,
            path: lock_path,
            identity: identity.to_string(),
        })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identity this guard protects.
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        // Closing the handle releases the lock too; unlock explicitly for clarity
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
