use stagehand::fetch::ArchiveHash;
use std::path::{Path, PathBuf};

/// A directory acting as the update server.
pub struct Publisher {
    dir: PathBuf,
}

impl Publisher {
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).unwrap();
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Publish `bytes` as `name` with a hex `.sha256` next to it; returns the location.
    pub fn publish(&self, name: &str, bytes: &[u8]) -> String {
        let path = self.dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        std::fs::write(
            self.dir.join(format!("{name}.sha256")),
            format!("{}  {name}\n", ArchiveHash::compute(bytes).to_hex()),
        )
        .unwrap();
        path.to_str().unwrap().to_string()
    }

    /// Overwrite the archive without touching its published hash.
    pub fn tamper(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.dir.join(name), bytes).unwrap();
    }
}

/// Relative paths of every file under `root`, with forward slashes.
pub fn tree(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    files.sort();
    files
}
