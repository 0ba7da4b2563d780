//! Directory synchronizer.
//!
//! Makes a destination tree mirror a source tree in two strictly ordered
//! phases:
//!
//! 1. **Copy**: every file in the source is copied over its counterpart in the
//!    destination, creating parent directories as needed.
//! 2. **Delete**: every file in the destination without a counterpart in the
//!    source is removed.
//!
//! The delete phase never starts before the copy phase has visited every
//! source file, so an interrupted promotion can leave stale extras behind but
//! never removes a file the new version still needs.
//!
//! Both phases are best-effort: a failing file is recorded and the walk moves
//! on. The first failure of either phase becomes the reported error.
//! Directories are only created implicitly and are never removed.

use crate::core::UpdateError;
use crate::utils::fs::{copy_file, ensure_dir};
use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Which pass a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Copying source files over the destination.
    Copy,
    /// Removing destination files absent from the source.
    Delete,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => f.write_str("copy"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// One file that could not be synchronized.
#[derive(Debug, Clone)]
pub struct SyncFailure {
    /// Phase the failure happened in
    pub phase: SyncPhase,
    /// Path that failed (source path for copies, destination path for deletes)
    pub path: PathBuf,
    /// Rendered error chain
    pub error: String,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.phase, self.path.display(), self.error)
    }
}

/// Everything a synchronization pass did.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Files copied into the destination
    pub copied: usize,
    /// Stale files removed from the destination
    pub deleted: usize,
    /// Per-file failures in the order they happened
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    /// Whether every file was handled.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// The first failure, if any.
    pub fn first_failure(&self) -> Option<&SyncFailure> {
        self.failures.first()
    }

    /// The [`UpdateError::SyncFailed`] summarising this report, if anything failed.
    pub fn error(&self) -> Option<UpdateError> {
        self.first_failure().map(|first| UpdateError::SyncFailed {
            failures: self.failures.len(),
            first: first.to_string(),
        })
    }

    /// Convert into a `Result`, failing with [`UpdateError::SyncFailed`] if anything failed.
    pub fn into_result(self) -> Result<Self> {
        match self.error() {
            None => Ok(self),
            Some(e) => Err(e.into()),
        }
    }

    fn record(&mut self, phase: SyncPhase, path: &Path, error: &anyhow::Error) {
        warn!("Sync {} failed for {}: {:#}", phase, path.display(), error);
        self.failures.push(SyncFailure {
            phase,
            path: path.to_path_buf(),
            error: format!("{error:#}"),
        });
    }
}

/// File operations used by the synchronizer.
pub trait FileOps {
    /// Copy `src` over `dst`, creating parent directories.
    fn copy(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Remove the file at `path`.
    fn remove(&self, path: &Path) -> Result<()>;
}

impl<T: FileOps + ?Sized> FileOps for &T {
    fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        (**self).copy(src, dst)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        (**self).remove(path)
    }
}

/// [`FileOps`] on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileOps;

impl FileOps for LocalFileOps {
    fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        copy_file(src, dst)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))
    }
}

/// Mirrors one directory tree onto another.
#[derive(Debug, Clone, Default)]
pub struct DirectorySynchronizer<O = LocalFileOps> {
    ops: O,
}

impl DirectorySynchronizer {
    /// Synchronizer on the local filesystem.
    pub fn new() -> Self {
        Self {
            ops: LocalFileOps,
        }
    }
}

impl<O: FileOps> DirectorySynchronizer<O> {
    /// Synchronizer using custom file operations.
    pub const fn with_ops(ops: O) -> Self {
        Self {
            ops,
        }
    }

    /// Run both phases and return the full report, failures included.
    pub fn mirror(&self, src: &Path, dst: &Path) -> SyncReport {
        let mut report = SyncReport::default();

        // A missing source must not turn the delete phase into "delete everything"
        if !src.is_dir() {
            report.record(
                SyncPhase::Copy,
                src,
                &anyhow::anyhow!("source directory does not exist"),
            );
            return report;
        }
        if let Err(e) = ensure_dir(dst) {
            report.record(SyncPhase::Copy, dst, &e);
            return report;
        }

        self.copy_phase(src, dst, &mut report);
        self.delete_phase(src, dst, &mut report);

        debug!(
            "Synchronized {} -> {}: {} copied, {} deleted, {} failed",
            src.display(),
            dst.display(),
            report.copied,
            report.deleted,
            report.failures.len()
        );
        report
    }

    /// Run both phases, failing with the first per-file failure.
    pub fn sync(&self, src: &Path, dst: &Path) -> Result<SyncReport> {
        self.mirror(src, dst).into_result()
    }

    fn copy_phase(&self, src: &Path, dst: &Path, report: &mut SyncReport) {
        for entry in WalkDir::new(src).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(src).to_path_buf();
                    report.record(SyncPhase::Copy, &path, &anyhow::Error::from(e));
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(src) else {
                continue;
            };
            let target = dst.join(relative);
            match self.ops.copy(entry.path(), &target) {
                Ok(()) => report.copied += 1,
                Err(e) => report.record(SyncPhase::Copy, entry.path(), &e),
            }
        }
    }

    fn delete_phase(&self, src: &Path, dst: &Path, report: &mut SyncReport) {
        for entry in WalkDir::new(dst).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(dst).to_path_buf();
                    report.record(SyncPhase::Delete, &path, &anyhow::Error::from(e));
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(dst) else {
                continue;
            };
            if src.join(relative).exists() {
                continue;
            }
            match self.ops.remove(entry.path()) {
                Ok(()) => {
                    debug!("Removed stale {}", entry.path().display());
                    report.deleted += 1;
                }
                Err(e) => report.record(SyncPhase::Delete, entry.path(), &e),
            }
        }
    }
}

/// Make `dst` mirror `src` on the local filesystem.
///
/// # Errors
///
/// [`UpdateError::SyncFailed`] describing the first failure if any file could
/// not be copied or removed. Every other file is still processed.
pub fn sync(src: &Path, dst: &Path) -> Result<SyncReport> {
    DirectorySynchronizer::new().sync(src, dst)
}
