//! The `download` workflow: fetch, verify, stage.
//!
//! A committed stage short-circuits everything, including the network. A
//! published hash equal to the installed hash marker short-circuits the
//! archive download. Both are ordinary outcomes, not errors.

use crate::fetch::{ArchiveFetcher, ArchiveHash, ByteSource, FetchOutcome};
use crate::layout::AppLayout;
use crate::staging::{StageOutcome, StagingManager};
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, info};

/// Result of [`Downloader::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A committed stage was already waiting; nothing was fetched.
    AlreadyStaged,
    /// The installation already runs the published archive.
    NoUpdateAvailable,
    /// A new archive was verified and committed as a stage.
    Staged {
        /// Hash of the staged archive
        hash: ArchiveHash,
        /// Number of files in the stage
        files: usize,
    },
}

impl DownloadOutcome {
    /// Whether the run left the directories exactly as it found them.
    pub fn is_noop(&self) -> bool {
        !matches!(self, Self::Staged { .. })
    }
}

/// Fetches and stages updates for one application.
pub struct Downloader<'a> {
    layout: &'a AppLayout,
    source: &'a dyn ByteSource,
    staging: StagingManager<'a>,
}

impl<'a> Downloader<'a> {
    /// Create a downloader.
    ///
    /// `updater_name` and `current_exe` decide which binary lands in the
    /// working copy; see [`StagingManager::new`].
    pub fn new(
        layout: &'a AppLayout,
        source: &'a dyn ByteSource,
        updater_name: impl Into<String>,
        current_exe: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            layout,
            source,
            staging: StagingManager::new(layout, updater_name, current_exe),
        }
    }

    /// Pause between deleting and recreating the staging directories.
    #[must_use]
    pub fn with_recreate_delay(mut self, delay: Duration) -> Self {
        self.staging = self.staging.with_recreate_delay(delay);
        self
    }

    /// Check `archive_location` for an update and stage it.
    pub fn run(&self, archive_location: &str) -> Result<DownloadOutcome> {
        if self.layout.is_ready() {
            debug!("Update already staged; skipping download");
            return Ok(DownloadOutcome::AlreadyStaged);
        }

        let installed = ArchiveHash::read_marker(&self.layout.installed_hash_marker());
        let archive = match ArchiveFetcher::new(self.source).fetch(archive_location, installed)? {
            FetchOutcome::NoUpdateAvailable {
                hash,
            } => {
                debug!("Already running {}", hash);
                return Ok(DownloadOutcome::NoUpdateAvailable);
            }
            FetchOutcome::Verified(archive) => archive,
        };

        match self.staging.stage(&archive)? {
            StageOutcome::AlreadyStaged => Ok(DownloadOutcome::AlreadyStaged),
            StageOutcome::Staged {
                hash,
                files,
            } => {
                info!("Update {} is ready to install", hash);
                Ok(DownloadOutcome::Staged {
                    hash,
                    files,
                })
            }
        }
    }
}
