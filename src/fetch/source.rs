//! Byte sources: where published hashes and archives are read from.
//!
//! The transport is a plain blocking "give me all the bytes at this location"
//! primitive. HTTP(S) goes through a blocking `reqwest` client with no overall
//! timeout; `file://` URLs and bare paths are read from disk, which is handy
//! for local mirrors and for tests.

use crate::core::UpdateError;
use anyhow::Result;
use std::path::PathBuf;
use tracing::debug;

/// Something that can return the full contents at a location.
pub trait ByteSource {
    /// Fetch every byte at `location`.
    fn fetch(&self, location: &str) -> Result<Vec<u8>>;
}

/// HTTP(S) source backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    /// Build a client with the updater's user agent and no request timeout.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("stagehand/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(|e| UpdateError::Transport {
                location: "<client>".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
        })
    }
}

impl ByteSource for HttpSource {
    fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        debug!("GET {}", location);

        let transport = |reason: String| UpdateError::Transport {
            location: location.to_string(),
            reason,
        };

        let response = self.client.get(location).send().map_err(|e| transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(transport(format!("HTTP {status}")).into());
        }

        let bytes = response.bytes().map_err(|e| transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Local filesystem source for `file://` URLs and plain paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl FileSource {
    fn resolve(location: &str) -> PathBuf {
        let Some(rest) = location.strip_prefix("file://") else {
            return PathBuf::from(location);
        };

        // file:///C:/dir -> C:/dir
        let bytes = rest.as_bytes();
        if bytes.len() >= 3
            && bytes[0] == b'/'
            && bytes[2] == b':'
            && bytes[1].is_ascii_alphabetic()
        {
            PathBuf::from(&rest[1..])
        } else {
            PathBuf::from(rest)
        }
    }
}

impl ByteSource for FileSource {
    fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        let path = Self::resolve(location);
        debug!("Reading {}", path.display());

        std::fs::read(&path).map_err(|e| {
            UpdateError::Transport {
                location: location.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Pick a source for `location` by its scheme.
///
/// `http://` and `https://` use [`HttpSource`]; `file://` and anything
/// without a scheme use [`FileSource`]. Other schemes are rejected.
pub fn source_for(location: &str) -> Result<Box<dyn ByteSource>> {
    let lower = location.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(Box::new(HttpSource::new()?));
    }
    if lower.starts_with("file://") || !has_scheme(location) {
        return Ok(Box::new(FileSource));
    }
    Err(UpdateError::Transport {
        location: location.to_string(),
        reason: "unsupported URL scheme".to_string(),
    }
    .into())
}

fn has_scheme(location: &str) -> bool {
    match location.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_source_plain_path_and_url() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("archive.zip");
        std::fs::write(&path, b"zip bytes").unwrap();

        let plain = path.to_str().unwrap();
        assert_eq!(FileSource.fetch(plain).unwrap(), b"zip bytes");

        let url = format!("file://{}", plain.replace('\\', "/"));
        let url = if url.starts_with("file:///") {
            url
        } else {
            url.replacen("file://", "file:///", 1)
        };
        assert_eq!(FileSource.fetch(&url).unwrap(), b"zip bytes");
    }

    #[test]
    fn test_file_source_missing_is_transport_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.zip");
        let err = FileSource.fetch(missing.to_str().unwrap()).unwrap_err();
        assert!(matches!(err.downcast_ref::<UpdateError>(), Some(UpdateError::Transport { .. })));
    }

    #[test]
    fn test_resolve_windows_drive_url() {
        assert_eq!(FileSource::resolve("file:///C:/Acme/a.zip"), PathBuf::from("C:/Acme/a.zip"));
        assert_eq!(FileSource::resolve("file:///srv/a.zip"), PathBuf::from("/srv/a.zip"));
    }

    #[test]
    fn test_source_for_schemes() {
        assert!(source_for("https://example.com/a.zip").is_ok());
        assert!(source_for("file:///tmp/a.zip").is_ok());
        assert!(source_for("/tmp/a.zip").is_ok());
        assert!(source_for(r"C:\Acme\a.zip").is_ok());

        let err = source_for("ftp://example.com/a.zip").err().unwrap();
        assert!(err.to_string().contains("unsupported URL scheme"));
    }
}
