//! Staging manager.
//!
//! Turns a verified archive into a committed stage next to the installation:
//!
//! 1. Recreate the staged and working-copy directories from scratch
//! 2. Unpack the archive into the staged directory, keeping entry mtimes
//! 3. Record the archive hash in the staged hash marker
//! 4. Make sure the stage carries an updater binary, then copy it into the
//!    working copy
//! 5. Write the ready marker
//!
//! The ready marker is written last and nothing else creates it, so its
//! presence means every earlier step completed. Archive entries named like
//! the marker are skipped during extraction. An interrupted stage leaves no
//! marker and is wiped by the next attempt.

use crate::constants::READY_MARKER;
use crate::core::UpdateError;
use crate::fetch::{ArchiveHash, VerifiedArchive};
use crate::layout::AppLayout;
use crate::utils::fs::{atomic_write, copy_file, ensure_dir, ensure_parent_dir, remove_dir_all};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Outcome of [`StagingManager::stage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// A committed stage already existed; nothing was touched.
    AlreadyStaged,
    /// A new stage was committed.
    Staged {
        /// Hash recorded in the staged hash marker
        hash: ArchiveHash,
        /// Number of files unpacked from the archive
        files: usize,
    },
}

/// Builds committed stages for one application layout.
#[derive(Debug, Clone)]
pub struct StagingManager<'a> {
    layout: &'a AppLayout,
    recreate_delay: Duration,
    updater_name: String,
    current_exe: PathBuf,
}

impl<'a> StagingManager<'a> {
    /// Create a manager for `layout`.
    ///
    /// `updater_name` is the file name the updater binary gets in the working
    /// copy. If the archive ships a file of that name it is used as the
    /// updater; otherwise `current_exe` is copied.
    pub fn new(
        layout: &'a AppLayout,
        updater_name: impl Into<String>,
        current_exe: impl Into<PathBuf>,
    ) -> Self {
        Self {
            layout,
            recreate_delay: Duration::ZERO,
            updater_name: updater_name.into(),
            current_exe: current_exe.into(),
        }
    }

    /// Pause between deleting and recreating the staging directories.
    #[must_use]
    pub const fn with_recreate_delay(mut self, delay: Duration) -> Self {
        self.recreate_delay = delay;
        self
    }

    /// Stage `archive`, unless a committed stage already exists.
    pub fn stage(&self, archive: &VerifiedArchive) -> Result<StageOutcome> {
        if self.layout.is_ready() {
            debug!("Stage already committed at {}", self.layout.staged().display());
            return Ok(StageOutcome::AlreadyStaged);
        }

        let staged = self.layout.staged();
        let working_copy = self.layout.working_copy();

        remove_dir_all(staged)?;
        remove_dir_all(working_copy)?;
        // Directory deletion can settle asynchronously on some filesystems
        if !self.recreate_delay.is_zero() {
            std::thread::sleep(self.recreate_delay);
        }
        ensure_dir(staged)?;
        ensure_dir(working_copy)?;

        let files = extract_archive(&archive.zip_bytes, staged)?;
        debug!("Unpacked {} file(s) into {}", files, staged.display());

        archive.hash.write_marker(&self.layout.staged_hash_marker())?;

        let staged_updater = self.ensure_staged_updater()?;
        let updater_target = working_copy.join(&self.updater_name);
        copy_file(&staged_updater, &updater_target)?;
        debug!("Updater copied to {}", updater_target.display());

        atomic_write(&self.layout.ready_marker(), b"")?;
        info!("Staged update {} ({} files)", archive.hash, files);

        Ok(StageOutcome::Staged {
            hash: archive.hash,
            files,
        })
    }

    // Promotion mirrors the stage; an updater missing here is deleted from the installation
    fn ensure_staged_updater(&self) -> Result<PathBuf> {
        let staged_updater = self.layout.staged().join(&self.updater_name);
        if !staged_updater.is_file() {
            warn!(
                "Archive does not ship {}; staging the running updater instead",
                self.updater_name
            );
            copy_file(&self.current_exe, &staged_updater)?;
        }
        Ok(staged_updater)
    }
}

/// Unpack a ZIP container into `dest`, returning the number of files written.
///
/// Entries whose names would resolve outside `dest` are rejected.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<usize> {
    let archive_error = |e: zip::result::ZipError| UpdateError::Archive {
        reason: e.to_string(),
    };

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_error)?;
    let mut files = 0;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(archive_error)?;
        let relative = entry.enclosed_name().ok_or_else(|| UpdateError::Archive {
            reason: format!("entry '{}' escapes the staging directory", entry.name()),
        })?;
        if is_reserved_entry(&relative) {
            warn!("Skipping archive entry '{}': reserved for the updater", entry.name());
            continue;
        }
        let out_path = dest.join(relative);

        if entry.is_dir() {
            ensure_dir(&out_path)?;
            continue;
        }

        ensure_parent_dir(&out_path)?;
        let mut file = File::create(&out_path)
            .with_context(|| format!("Failed to create {}", out_path.display()))?;
        std::io::copy(&mut entry, &mut file)
            .with_context(|| format!("Failed to unpack {}", out_path.display()))?;

        if let Some(modified) = entry.last_modified().and_then(zip_time_to_system)
            && let Err(e) = file.set_modified(modified)
        {
            warn!("Failed to set modification time on {}: {}", out_path.display(), e);
        }
        drop(file);

        apply_unix_mode(entry.unix_mode(), &out_path)?;
        files += 1;
    }

    Ok(files)
}

// The ready marker and the temp file it is written through
fn is_reserved_entry(relative: &Path) -> bool {
    let marker = Path::new(READY_MARKER);
    relative == marker || relative == marker.with_extension("tmp")
}

#[cfg(unix)]
fn apply_unix_mode(mode: Option<u32>, path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    // Owner write stays on so later promotions can overwrite the file
    if let Some(mode) = mode {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode((mode & 0o7777) | 0o200))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_unix_mode(_mode: Option<u32>, _path: &Path) -> Result<()> {
    Ok(())
}

// ZIP timestamps carry no zone; treat them as UTC
fn zip_time_to_system(time: zip::DateTime) -> Option<SystemTime> {
    let date = chrono::NaiveDate::from_ymd_opt(
        i32::from(time.year()),
        u32::from(time.month()),
        u32::from(time.day()),
    )?;
    let datetime = date.and_hms_opt(
        u32::from(time.hour()),
        u32::from(time.minute()),
        u32::from(time.second()),
    )?;
    Some(SystemTime::from(datetime.and_utc()))
}
