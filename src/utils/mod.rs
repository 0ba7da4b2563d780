//! Cross-platform utilities and helpers
//!
//! # Modules
//!
//! - [`fs`] - File system operations with atomic writes and directory helpers
//! - [`platform`] - Platform-specific helpers

pub mod fs;
pub mod platform;

pub use fs::{atomic_write, copy_file, ensure_dir, remove_dir_all, safe_write};
pub use platform::is_windows;
