//! SHA-256 archive hashes: published form, on-disk marker form, verification.

use crate::constants::{HASH_HEX_LEN, HASH_LEN};
use crate::core::UpdateError;
use crate::utils::fs::safe_write;
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// A 32-byte SHA-256 content hash of a published archive.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchiveHash([u8; HASH_LEN]);

impl ArchiveHash {
    /// Hash raw bytes.
    ///
    /// ```rust
    /// use stagehand::fetch::ArchiveHash;
    ///
    /// let hash = ArchiveHash::compute(b"Hello, World!");
    /// assert_eq!(
    ///     hash.to_hex(),
    ///     "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
    /// );
    /// ```
    pub fn compute(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(digest.into())
    }

    /// Parse the contents of a published `.sha256` resource.
    ///
    /// Two encodings are accepted:
    /// - exactly 32 raw bytes
    /// - at least 64 characters whose first 64 are hex; anything after them
    ///   (such as the ` *-` that `sha256sum` appends) is ignored
    ///
    /// # Errors
    ///
    /// [`UpdateError::HashFormat`] for any other shape.
    pub fn from_published(raw: &[u8]) -> Result<Self> {
        if raw.len() >= HASH_HEX_LEN
            && let Ok(decoded) = hex::decode(&raw[..HASH_HEX_LEN])
            && let Ok(bytes) = <[u8; HASH_LEN]>::try_from(decoded.as_slice())
        {
            return Ok(Self(bytes));
        }

        let bytes = <[u8; HASH_LEN]>::try_from(raw).map_err(|_| UpdateError::HashFormat {
            len: raw.len(),
        })?;
        Ok(Self(bytes))
    }

    /// Parse exactly 64 hex characters.
    pub fn from_hex(text: &str) -> Option<Self> {
        if text.len() != HASH_HEX_LEN {
            return None;
        }
        let decoded = hex::decode(text).ok()?;
        <[u8; HASH_LEN]>::try_from(decoded.as_slice()).ok().map(Self)
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw digest bytes.
    pub const fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Require that `bytes` hash to this value.
    ///
    /// # Errors
    ///
    /// [`UpdateError::HashMismatch`] carrying both hashes.
    pub fn verify(&self, bytes: &[u8]) -> Result<()> {
        let actual = Self::compute(bytes);
        if actual != *self {
            return Err(UpdateError::HashMismatch {
                expected: self.to_hex(),
                actual: actual.to_hex(),
            }
            .into());
        }
        Ok(())
    }

    /// Read a hash marker file.
    ///
    /// A missing, unreadable or malformed marker reads as `None`: the
    /// installation simply has no known hash and any published archive is new.
    pub fn read_marker(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No hash marker at {}: {}", path.display(), e);
                return None;
            }
        };
        let parsed = Self::from_hex(content.trim());
        if parsed.is_none() {
            debug!("Ignoring malformed hash marker at {}", path.display());
        }
        parsed
    }

    /// Write this hash as a hex marker file.
    pub fn write_marker(&self, path: &Path) -> Result<()> {
        safe_write(path, &self.to_hex())
    }
}

impl fmt::Display for ArchiveHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ArchiveHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchiveHash({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HELLO_HEX: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

    fn format_len(err: &anyhow::Error) -> Option<usize> {
        match err.downcast_ref::<UpdateError>() {
            Some(UpdateError::HashFormat {
                len,
            }) => Some(*len),
            _ => None,
        }
    }

    #[test]
    fn test_published_raw_bytes() {
        let expected = ArchiveHash::compute(b"Hello, World!");
        let parsed = ArchiveHash::from_published(expected.as_bytes()).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_published_hex_exact() {
        let parsed = ArchiveHash::from_published(HELLO_HEX.as_bytes()).unwrap();
        assert_eq!(parsed.to_hex(), HELLO_HEX);
    }

    #[test]
    fn test_published_hex_with_checksum_tool_suffix() {
        let published = format!("{HELLO_HEX} *-\n");
        let parsed = ArchiveHash::from_published(published.as_bytes()).unwrap();
        assert_eq!(parsed.to_hex(), HELLO_HEX);
    }

    #[test]
    fn test_published_hex_uppercase() {
        let published = HELLO_HEX.to_uppercase();
        let parsed = ArchiveHash::from_published(published.as_bytes()).unwrap();
        assert_eq!(parsed.to_hex(), HELLO_HEX);
    }

    #[test]
    fn test_published_wrong_lengths() {
        let err = ArchiveHash::from_published(b"abc").unwrap_err();
        assert_eq!(format_len(&err), Some(3));

        let short_hex = &HELLO_HEX[..63];
        let err = ArchiveHash::from_published(short_hex.as_bytes()).unwrap_err();
        assert_eq!(format_len(&err), Some(63));

        let not_hex = "z".repeat(70);
        let err = ArchiveHash::from_published(not_hex.as_bytes()).unwrap_err();
        assert_eq!(format_len(&err), Some(70));

        let err = ArchiveHash::from_published(&[]).unwrap_err();
        assert_eq!(format_len(&err), Some(0));
    }

    #[test]
    fn test_verify() {
        let hash = ArchiveHash::compute(b"archive");
        hash.verify(b"archive").unwrap();

        let err = hash.verify(b"archivf").unwrap_err();
        match err.downcast_ref::<UpdateError>() {
            Some(UpdateError::HashMismatch {
                expected,
                actual,
            }) => {
                assert_eq!(expected, &hash.to_hex());
                assert_eq!(actual, &ArchiveHash::compute(b"archivf").to_hex());
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_marker_round_trip_and_lenient_read() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("stagehand.this.sha256");

        assert_eq!(ArchiveHash::read_marker(&marker), None);

        let hash = ArchiveHash::compute(b"v1");
        hash.write_marker(&marker).unwrap();
        assert_eq!(std::fs::read_to_string(&marker).unwrap().len(), 64);
        assert_eq!(ArchiveHash::read_marker(&marker), Some(hash));

        std::fs::write(&marker, "not a hash").unwrap();
        assert_eq!(ArchiveHash::read_marker(&marker), None);

        std::fs::write(&marker, format!("{}\r\n", hash.to_hex())).unwrap();
        assert_eq!(ArchiveHash::read_marker(&marker), Some(hash));
    }
}
