//! stagehand CLI entry point
//!
//! This is the updater executable started by host applications.
//! It handles command-line argument parsing, error display, and command execution.
//!
//! - `download` - Check for an update and stage it
//! - `update` - Promote the staged update and relaunch the application

use anyhow::Result;
use clap::Parser;
use stagehand::cli;
use stagehand::core::user_friendly_error;

fn main() -> Result<()> {
    // Parse CLI arguments; malformed usage exits with status 2
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute() {
        Ok(()) => Ok(()),
        Err(e) => {
            // Convert to user-friendly error with context and suggestions
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
