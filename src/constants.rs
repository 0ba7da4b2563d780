//! Global constants used throughout the stagehand codebase.
//!
//! This module contains marker file names, directory suffixes, and the default
//! timings used by staging and promotion. Defining them centrally keeps the
//! on-disk layout discoverable in one place.

use std::time::Duration;

/// Suffix of the staged directory (`Vendor/Product-next`).
pub const STAGED_SUFFIX: &str = "-next";

/// Suffix of the working-copy directory (`Vendor/Product-temp`).
pub const WORKING_COPY_SUFFIX: &str = "-temp";

/// Zero-byte sentinel inside the staged directory marking a committed stage.
pub const READY_MARKER: &str = "update.ready";

/// Hex-encoded SHA-256 of the archive that produced the directory's contents.
pub const HASH_MARKER: &str = "stagehand.this.sha256";

/// Suffix appended to the published archive location to find its hash.
pub const HASH_RESOURCE_SUFFIX: &str = ".sha256";

/// Location suffix that marks a bzip2 layer around the zip container.
pub const BZIP2_SUFFIX: &str = ".bz2";

/// Suffix given to the live executable while a promotion is running.
pub const DISABLED_SUFFIX: &str = ".disabled";

/// Prefix of the instance lock name for updater processes.
pub const RUNNER_LOCK_PREFIX: &str = "stagehand-runner-lock-";

/// Prefix of the instance lock name held by a running host application.
pub const HOST_LOCK_PREFIX: &str = "stagehand-host-lock-";

/// Name of the optional configuration file inside the vendor directory.
pub const CONFIG_FILE_NAME: &str = "stagehand.toml";

/// Length in bytes of a raw SHA-256 digest.
pub const HASH_LEN: usize = 32;

/// Length in characters of a hex-encoded SHA-256 digest.
pub const HASH_HEX_LEN: usize = 64;

/// How long Disabling keeps retrying the executable rename (1 second).
pub const DEFAULT_DISABLE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Pause after a successful disable so the exiting host can drop its handles (50ms).
pub const DEFAULT_HANDLE_RELEASE_DELAY: Duration = Duration::from_millis(50);

/// Pause between deleting and recreating the staging directories (10ms).
///
/// Creating a directory immediately after removing it fails intermittently on
/// Windows while the delete is still pending.
pub const DEFAULT_RECREATE_DELAY: Duration = Duration::from_millis(10);

/// Log files larger than this are truncated when first opened (5 MiB).
pub const DEFAULT_LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Default log file name, placed in the vendor directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "stagehand.log";
