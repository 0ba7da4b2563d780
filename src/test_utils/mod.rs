//! Test utilities for stagehand
//!
//! This module provides fixtures shared by unit tests and the integration
//! suite:
//!
//! - [`InstallFixture`] - a throwaway `<vendor>/<product>` installation
//! - [`build_zip`] / [`ZipEntry`] - in-memory archives
//! - [`MemorySource`] - a [`ByteSource`] serving canned bytes and recording requests
//! - [`RecordingLauncher`] - a [`Launcher`] that records instead of spawning
//!
//! # Example
//!
//! ```rust,no_run
//! use stagehand::test_utils::{InstallFixture, ZipEntry, build_zip};
//!
//! let fixture = InstallFixture::new("Acme", "Widget");
//! fixture.install(&[("widget.exe", "v1")]);
//! let archive = build_zip(&[ZipEntry::file("widget.exe", b"v2")]);
//! assert!(!archive.is_empty());
//! ```

use crate::core::UpdateError;
use crate::fetch::ByteSource;
use crate::layout::AppLayout;
use crate::orchestrator::Launcher;
use anyhow::Result;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` if given, otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// A temporary `<root>/<vendor>/<product>` installation.
pub struct InstallFixture {
    temp: TempDir,
    layout: AppLayout,
    updater_exe: PathBuf,
}

impl InstallFixture {
    /// Create an empty installation. The installed directory exists; the
    /// staged and working-copy directories do not.
    pub fn new(vendor: &str, product: &str) -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let layout =
            AppLayout::new(temp.path().join(vendor), product).expect("valid fixture layout");
        std::fs::create_dir_all(layout.installed()).expect("create installed dir");

        let updater_exe = temp.path().join("bin").join("stagehand");
        std::fs::create_dir_all(updater_exe.parent().expect("bin dir")).expect("create bin dir");
        std::fs::write(&updater_exe, b"updater binary").expect("write updater");

        Self {
            temp,
            layout,
            updater_exe,
        }
    }

    /// Root of the temporary tree.
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Layout of the fixture installation.
    pub fn layout(&self) -> &AppLayout {
        &self.layout
    }

    /// Stand-in for the running updater executable, outside the installation.
    pub fn updater_exe(&self) -> &Path {
        &self.updater_exe
    }

    /// Private lock directory, so parallel tests never share instance locks.
    pub fn lock_dir(&self) -> PathBuf {
        self.temp.path().join("locks")
    }

    /// Write `(relative path, content)` files into the installed directory.
    pub fn install(&self, files: &[(&str, &str)]) {
        write_files(self.layout.installed(), files);
    }

    /// Write files into the staged directory and commit it with a ready marker.
    pub fn stage(&self, files: &[(&str, &str)]) {
        write_files(self.layout.staged(), files);
        std::fs::write(self.layout.ready_marker(), b"").expect("write ready marker");
    }
}

fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().expect("file has a parent")).expect("create dir");
        std::fs::write(&path, content).expect("write fixture file");
    }
}

/// One entry of an archive built by [`build_zip`].
#[derive(Debug, Clone)]
pub struct ZipEntry {
    name: String,
    content: Vec<u8>,
    is_dir: bool,
    modified: Option<(u16, u8, u8, u8, u8, u8)>,
    mode: Option<u32>,
}

impl ZipEntry {
    /// A file entry.
    pub fn file(name: &str, content: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            content: content.to_vec(),
            is_dir: false,
            modified: None,
            mode: None,
        }
    }

    /// A directory entry.
    pub fn dir(name: &str) -> Self {
        Self {
            name: name.to_string(),
            content: Vec::new(),
            is_dir: true,
            modified: None,
            mode: None,
        }
    }

    /// Set the entry's modification time (ZIP times have 2-second resolution).
    #[must_use]
    pub fn modified(
        mut self,
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Self {
        self.modified = Some((year, month, day, hour, minute, second));
        self
    }

    /// Set the entry's Unix permission bits.
    #[must_use]
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Build a ZIP container in memory.
pub fn build_zip(entries: &[ZipEntry]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in entries {
        let mut options = SimpleFileOptions::default();
        if let Some((year, month, day, hour, minute, second)) = entry.modified {
            let time = zip::DateTime::from_date_and_time(year, month, day, hour, minute, second)
                .expect("valid zip timestamp");
            options = options.last_modified_time(time);
        }
        if let Some(mode) = entry.mode {
            options = options.unix_permissions(mode);
        }

        if entry.is_dir {
            writer.add_directory(entry.name.as_str(), options).expect("add zip directory");
        } else {
            writer.start_file(entry.name.as_str(), options).expect("start zip entry");
            writer.write_all(&entry.content).expect("write zip entry");
        }
    }

    writer.finish().expect("finish zip").into_inner()
}

/// Compress bytes with bzip2, as a publisher of `.bz2` archives would.
pub fn bzip2_compress(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(bytes).expect("bzip2 write");
    encoder.finish().expect("bzip2 finish")
}

/// In-memory [`ByteSource`] that records every requested location.
#[derive(Debug, Default)]
pub struct MemorySource {
    resources: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MemorySource {
    /// An empty source; every fetch fails until resources are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` at `location`.
    #[must_use]
    pub fn with(mut self, location: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.resources.insert(location.into(), bytes);
        self
    }

    /// Locations requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl ByteSource for MemorySource {
    fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        self.requests.lock().expect("requests lock").push(location.to_string());
        self.resources.get(location).cloned().ok_or_else(|| {
            UpdateError::Transport {
                location: location.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            }
            .into()
        })
    }
}

/// [`Launcher`] that records launches instead of starting processes.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launches: Mutex<Vec<(PathBuf, Vec<String>)>>,
    fail: bool,
}

impl RecordingLauncher {
    /// A launcher whose launches all succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// A launcher whose launches are recorded but fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Launches so far, in order.
    pub fn launches(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.launches.lock().expect("launches lock").clone()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, program: &Path, args: &[String]) -> Result<()> {
        self.launches.lock().expect("launches lock").push((program.to_path_buf(), args.to_vec()));
        if self.fail {
            return Err(UpdateError::LaunchFailed {
                path: program.display().to_string(),
                reason: "simulated launch failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
