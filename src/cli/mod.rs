//! Command-line interface for stagehand.
//!
//! The updater binary is started by the host application, never by hand, so
//! the surface is deliberately small:
//!
//! - `download <archive-url>` - check for an update and stage it
//! - `update <main-executable-name>` - promote the staged update and relaunch
//!
//! # Startup Sequence
//!
//! Every invocation runs the same preamble before dispatching:
//!
//! 1. Derive the application layout from the running executable's path
//! 2. Load `stagehand.toml` (see [`crate::config`])
//! 3. Install logging to `<vendor>/stagehand.log`
//! 4. Acquire the per-application runner lock; a second concurrent updater
//!    exits with "another instance is already running"
//!
//! # Global Flags
//!
//! - `--verbose` - Mirror debug output to stderr
//! - `--quiet` - Nothing on stderr; the log file still records everything
//!
//! # Exit Codes
//!
//! - `0` - success, including "no update available" and "already staged"
//! - `1` - any failure (the log file has the details)
//! - `2` - malformed command line

mod download;
mod update;

pub use download::DownloadCommand;
pub use update::UpdateCommand;

use crate::config::UpdaterConfig;
use crate::guard::{InstanceGuard, LockScope};
use crate::layout::AppLayout;
use crate::logging;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, error};

/// Runtime settings derived from the global flags.
///
/// Kept separate from [`Cli`] so tests can drive commands without parsing.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Stderr log level when `RUST_LOG` is unset; `None` silences stderr.
    pub stderr_level: Option<String>,
}

/// Everything a subcommand needs after the preamble.
#[derive(Debug)]
pub struct RunContext {
    /// Layout derived from the executable path
    pub layout: AppLayout,
    /// Effective configuration
    pub config: UpdaterConfig,
    /// Path of the running executable
    pub current_exe: PathBuf,
}

impl RunContext {
    /// Name of the updater binary inside the application directories.
    pub fn updater_name(&self) -> String {
        self.config
            .updater_exe_name(&self.current_exe)
            .unwrap_or_else(|| format!("stagehand{}", std::env::consts::EXE_SUFFIX))
    }
}

/// Self-update agent for applications installed under `<vendor>/<product>/`.
#[derive(Parser)]
#[command(
    name = "stagehand",
    about = "Stage and apply application self-updates",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Mirror debug output to stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Write nothing to stderr.
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Check for a newer archive and stage it next to the installation.
    Download(DownloadCommand),

    /// Replace the installation with the staged update and relaunch it.
    Update(UpdateCommand),
}

impl Cli {
    /// Run the parsed command.
    pub fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config)
    }

    /// Translate the global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let stderr_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("warn".to_string())
        };

        CliConfig {
            stderr_level,
        }
    }

    /// Run the preamble with `cli_config`, then the subcommand.
    pub fn execute_with_config(self, cli_config: CliConfig) -> Result<()> {
        let current_exe =
            std::env::current_exe().context("Failed to get current executable path")?;
        let layout = AppLayout::from_exe(&current_exe)?;
        let config = UpdaterConfig::load(layout.vendor_dir())?;

        logging::init(&layout, &config.log, cli_config.stderr_level.as_deref());
        debug!("Running from {} for {}", current_exe.display(), layout.identity());

        let _guard =
            InstanceGuard::acquire(&config.lock_dir(), layout.identity(), LockScope::Runner)
                .inspect_err(|e| error!("{:#}", e))?;

        let ctx = RunContext {
            layout,
            config,
            current_exe,
        };

        match self.command {
            Commands::Download(cmd) => cmd.execute(&ctx),
            Commands::Update(cmd) => cmd.execute(&ctx),
        }
    }
}
