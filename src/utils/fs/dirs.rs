//! Directory and single-file operations used by staging and promotion.

use crate::utils::platform::{is_windows, windows_long_path};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Create `path` and its parents unless it is already a directory.
///
/// A non-directory at `path` is an error.
pub fn ensure_dir(path: &Path) -> Result<()> {
    let long_path = windows_long_path(path);

    if long_path.is_dir() {
        return Ok(());
    }
    if long_path.exists() {
        anyhow::bail!("Path exists but is not a directory: {}", path.display());
    }

    fs::create_dir_all(&long_path).with_context(|| {
        let hint = if is_windows() {
            "paths over 260 characters need long path support"
        } else {
            "check the parent directory's permissions"
        };
        format!("Failed to create directory {} ({hint})", path.display())
    })
}

/// [`ensure_dir`] on the parent of `path`, if it has one.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Remove a directory tree. Missing is fine.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Copy `src` over `dst`, creating `dst`'s parents.
///
/// The destination is truncated in place rather than replaced. On Unix the
/// permission bits travel with the contents.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    ensure_parent_dir(dst)?;
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}
