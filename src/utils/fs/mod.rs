//! File system utilities for cross-platform file operations
//!
//! This module provides the small set of file operations that staging and
//! promotion are built on. All functions handle platform-specific differences
//! such as Windows long paths.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stagehand::utils::fs::{atomic_write, ensure_dir, remove_dir_all};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! remove_dir_all(Path::new("Acme/Widget-next"))?;
//! ensure_dir(Path::new("Acme/Widget-next"))?;
//! atomic_write(Path::new("Acme/Widget-next/update.ready"), b"")?;
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod dirs;

// Directory operations
pub use dirs::{copy_file, ensure_dir, ensure_parent_dir, remove_dir_all};

// Atomic write operations
pub use atomic::{atomic_write, safe_write};
