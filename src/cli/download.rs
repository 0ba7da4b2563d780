//! `download` subcommand.

use super::RunContext;
use crate::download::{DownloadOutcome, Downloader};
use crate::fetch::source_for;
use anyhow::Result;
use clap::Args;
use tracing::{error, info};

/// Check for a newer archive and stage it.
///
/// The published hash is read from `<URL>.sha256`. If it matches the
/// installed version nothing is downloaded; if an update is already staged
/// nothing is fetched at all.
#[derive(Debug, Args)]
pub struct DownloadCommand {
    /// Archive URL (`https://`, `http://`, `file://` or a local path).
    /// A `.bz2` suffix means the ZIP is bzip2-compressed.
    #[arg(value_name = "URL")]
    archive_location: String,
}

impl DownloadCommand {
    /// Where the archive is published.
    pub fn archive_location(&self) -> &str {
        &self.archive_location
    }

    pub(super) fn execute(self, ctx: &RunContext) -> Result<()> {
        let source = source_for(&self.archive_location)?;
        let downloader = Downloader::new(
            &ctx.layout,
            &*source,
            ctx.updater_name(),
            &ctx.current_exe,
        )
        .with_recreate_delay(ctx.config.recreate_delay());

        match downloader.run(&self.archive_location) {
            Ok(DownloadOutcome::Staged {
                hash,
                files,
            }) => {
                info!("Download complete: {} ({} files)", hash, files);
                Ok(())
            }
            Ok(DownloadOutcome::AlreadyStaged | DownloadOutcome::NoUpdateAvailable) => Ok(()),
            Err(e) => {
                error!("Download failed: {:#}", e);
                Err(e)
            }
        }
    }
}
