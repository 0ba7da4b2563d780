//! stagehand - self-update agent for installed desktop applications
//!
//! An application installed at `<vendor>/<product>/` ships the `stagehand`
//! binary next to its own executable. The updater keeps two sibling
//! directories, `<product>-next` for a pending version and `<product>-temp`
//! for a copy of itself, and moves updates through them in two separate
//! processes:
//!
//! - **download**: compare the published SHA-256 with the installed one,
//!   download and verify the archive, unpack it into the staged directory and
//!   commit the stage with a ready marker
//! - **update**: running from the working copy, disable the live executable,
//!   mirror the staged directory onto the installed one, relaunch, clean up
//!
//! # Architecture Overview
//!
//! ```text
//! host app ──(no stage)──► stagehand download URL ──► fetch ──► staging
//!     │
//!     └─(stage ready)──► <product>-temp/stagehand update EXE ──► orchestrator ──► sync
//! ```
//!
//! # Core Modules
//!
//! ## Update Pipeline
//! - [`fetch`] - Published hash parsing, byte sources, archive verification
//! - [`staging`] - Unpacking into the staged directory and committing the stage
//! - [`sync`] - Copy-then-delete directory mirroring
//! - [`orchestrator`] - The promotion state machine and process relaunch
//! - [`download`] - The `download` workflow tying fetch and staging together
//!
//! ## Process Coordination
//! - [`guard`] - Per-application instance locks
//! - [`host`] - Startup hook for host applications
//! - [`layout`] - Application identity and the installed/staged/working-copy triad
//!
//! ## Supporting Modules
//! - [`cli`] - Command-line interface
//! - [`config`] - Optional `stagehand.toml` settings
//! - [`core`] - Error taxonomy and user-facing error reporting
//! - [`logging`] - File and stderr logging
//! - [`utils`] - Filesystem and platform helpers
//!
//! # Command-Line Usage
//!
//! ```bash
//! # From the installed directory: check for and stage an update
//! stagehand download https://updates.example.com/widget.zip
//!
//! # From the working copy: apply the staged update
//! stagehand update widget.exe
//! ```

// Update pipeline
pub mod download;
pub mod fetch;
pub mod orchestrator;
pub mod staging;
pub mod sync;

// Process coordination
pub mod guard;
pub mod host;
pub mod layout;

// Supporting modules
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod logging;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
