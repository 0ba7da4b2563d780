//! Logging setup.
//!
//! Two `tracing` layers are installed:
//!
//! - a plain-text file layer writing `YYYY-MM-DD HH:MM:SS LEVEL message`
//!   lines to the updater log in the vendor directory
//! - a stderr layer, quiet by default, controlled by `RUST_LOG` or the CLI
//!   verbosity flags
//!
//! The log file is opened lazily on the first event. If it is larger than the
//! configured limit at that point it is truncated. A log file that cannot be
//! opened or written never fails the update; its events are dropped.

use crate::config::LogConfig;
use crate::layout::AppLayout;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::prelude::*;

/// Local wall-clock timestamps with second precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTimestamp;

impl FormatTime for LogTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Size-capped, lazily opened log file.
#[derive(Debug)]
pub struct RotatingLogFile {
    path: PathBuf,
    max_bytes: u64,
    state: Mutex<SinkState>,
}

#[derive(Debug)]
enum SinkState {
    Unopened,
    Open(File),
    Unavailable,
}

impl RotatingLogFile {
    /// Sink for `path`, truncated on open when it exceeds `max_bytes`.
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            path: path.into(),
            max_bytes,
            state: Mutex::new(SinkState::Unopened),
        }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> io::Result<File> {
        let oversized = std::fs::metadata(&self.path).is_ok_and(|m| m.len() > self.max_bytes);

        let mut options = OpenOptions::new();
        options.create(true);
        if oversized {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        options.open(&self.path)
    }
}

impl Write for &RotatingLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if matches!(*state, SinkState::Unopened) {
            *state = match self.open() {
                Ok(file) => SinkState::Open(file),
                Err(_) => SinkState::Unavailable,
            };
        }

        if let SinkState::Open(file) = &mut *state
            && file.write_all(buf).is_err()
        {
            *state = SinkState::Unavailable;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let SinkState::Open(file) = &mut *state {
            let _ = file.flush();
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RotatingLogFile {
    type Writer = &'a RotatingLogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}

/// Filter for the stderr layer: `RUST_LOG` wins, then `fallback`.
fn stderr_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber for an updater process.
///
/// `stderr_level` is the stderr level used when `RUST_LOG` is unset; `None`
/// silences stderr entirely. Calling this twice is harmless; the second call
/// keeps the first subscriber.
pub fn init(layout: &AppLayout, config: &LogConfig, stderr_level: Option<&str>) {
    // The log lives next to the three application directories
    let sink = RotatingLogFile::new(layout.vendor_dir().join(&config.file_name), config.max_bytes);
    let file_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(sink)
        .with_ansi(false)
        .with_target(false)
        .with_timer(LogTimestamp)
        .with_filter(file_filter);

    let stderr_layer = stderr_level.map(|level| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .without_time()
            .with_filter(stderr_filter(level))
    });

    // Fails only if a subscriber is already installed
    let _ = tracing_subscriber::registry().with(file_layer).with(stderr_layer).try_init();
}
