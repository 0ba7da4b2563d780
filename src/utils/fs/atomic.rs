//! Write-then-rename file writes.
//!
//! Marker files go through here so a reader never sees a half-written hash or
//! an interrupted ready marker.

use crate::utils::fs::dirs::ensure_parent_dir;
use crate::utils::platform::windows_long_path;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// [`atomic_write`] for text.
pub fn safe_write(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Write `content` to `<path>.tmp` (extension replaced), sync it, then rename
/// it over `path`. Parent directories are created.
///
/// ```rust,no_run
/// use stagehand::utils::fs::atomic_write;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// atomic_write(Path::new("Acme/Widget-next/update.ready"), b"")?;
/// # Ok(())
/// # }
/// ```
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let target = windows_long_path(path);
    ensure_parent_dir(&target)?;
    let temp_path = target.with_extension("tmp");

    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create {}", temp_path.display()))?;
    file.write_all(content)
        .with_context(|| format!("Failed to write {}", temp_path.display()))?;
    file.sync_all().with_context(|| format!("Failed to sync {}", temp_path.display()))?;
    drop(file);

    std::fs::rename(&temp_path, &target)
        .with_context(|| format!("Failed to move {} into place", target.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_safe_write() {
        let temp = tempdir().unwrap();
        let file_path = temp.path().join("marker.sha256");

        safe_write(&file_path, "abc").unwrap();

        assert_eq!(std::fs::read_to_string(&file_path).unwrap(), "abc");
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("atomic.txt");

        atomic_write(&file, b"initial").unwrap();
        atomic_write(&file, b"updated").unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "updated");
    }

    #[test]
    fn test_atomic_write_empty_file_leaves_no_temp() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("nested").join("update.ready");

        atomic_write(&file, b"").unwrap();
        assert!(file.exists());
        assert_eq!(std::fs::metadata(&file).unwrap().len(), 0);
        assert!(!temp.path().join("nested").join("update.tmp").exists());
    }
}
