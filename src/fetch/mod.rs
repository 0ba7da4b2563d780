//! Archive fetcher.
//!
//! Given an archive location, the fetcher reads the published hash at
//! `<location>.sha256`, compares it with the installed hash marker, and only
//! when they differ downloads the archive itself. The downloaded bytes must
//! hash to the published value before anything else looks at them; a `.bz2`
//! location is decompressed only after that check, so the published hash
//! always covers the bytes as served.
//!
//! Nothing here touches the installation directories.

pub mod hash;
pub mod source;

pub use hash::ArchiveHash;
pub use source::{ByteSource, FileSource, HttpSource, source_for};

use crate::constants::{BZIP2_SUFFIX, HASH_RESOURCE_SUFFIX};
use crate::core::UpdateError;
use anyhow::{Context, Result};
use std::io::Read;
use tracing::{debug, info};

/// A downloaded archive whose bytes matched the published hash.
#[derive(Debug, Clone)]
pub struct VerifiedArchive {
    /// Published hash the download was verified against.
    pub hash: ArchiveHash,
    /// ZIP container bytes, already decompressed if the location was `.bz2`.
    pub zip_bytes: Vec<u8>,
}

/// Result of a fetch.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A new archive was downloaded and verified.
    Verified(VerifiedArchive),
    /// The published hash equals the installed one; nothing was downloaded.
    NoUpdateAvailable {
        /// The hash shared by server and installation
        hash: ArchiveHash,
    },
}

/// Downloads and verifies archives from a [`ByteSource`].
pub struct ArchiveFetcher<'a> {
    source: &'a dyn ByteSource,
}

impl<'a> ArchiveFetcher<'a> {
    /// Create a fetcher reading from `source`.
    pub fn new(source: &'a dyn ByteSource) -> Self {
        Self {
            source,
        }
    }

    /// Fetch the archive at `location` unless `installed` already matches.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Transport`] if either resource cannot be read
    /// - [`UpdateError::HashFormat`] if the published hash is malformed
    /// - [`UpdateError::HashMismatch`] if the archive bytes do not match
    /// - [`UpdateError::Archive`] if bzip2 decompression fails
    pub fn fetch(&self, location: &str, installed: Option<ArchiveHash>) -> Result<FetchOutcome> {
        let hash_location = format!("{location}{HASH_RESOURCE_SUFFIX}");
        let published_raw = self
            .source
            .fetch(&hash_location)
            .with_context(|| format!("Failed to read published hash from {hash_location}"))?;
        let published = ArchiveHash::from_published(&published_raw)?;

        if installed == Some(published) {
            debug!("Installed hash {} matches {}", published, hash_location);
            return Ok(FetchOutcome::NoUpdateAvailable {
                hash: published,
            });
        }

        info!("Downloading {} (expecting {})", location, published);
        let archive = self
            .source
            .fetch(location)
            .with_context(|| format!("Failed to download archive from {location}"))?;
        published.verify(&archive)?;
        debug!("Archive verified: {} bytes", archive.len());

        let zip_bytes = if is_bzip2_location(location) {
            let decompressed = decompress_bzip2(&archive)?;
            debug!("Decompressed bzip2 archive to {} bytes", decompressed.len());
            decompressed
        } else {
            archive
        };

        Ok(FetchOutcome::Verified(VerifiedArchive {
            hash: published,
            zip_bytes,
        }))
    }
}

/// Whether the resource path of `location` ends in `.bz2`, ignoring any query or fragment.
pub fn is_bzip2_location(location: &str) -> bool {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    path.ends_with(BZIP2_SUFFIX)
}

fn decompress_bzip2(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = bzip2::read::MultiBzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| UpdateError::Archive {
        reason: format!("bzip2 decompression failed: {e}"),
    })?;
    Ok(out)
}
