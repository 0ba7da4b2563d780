//! Application identity and the installation triad.
//!
//! An application installed at `.../Vendor/Product/` owns three sibling
//! directories:
//!
//! ```text
//! Vendor/
//! ├── Product/        installed: the live copy
//! ├── Product-next/   staged: the pending version
//! ├── Product-temp/   working copy: the updater binary that runs promotion
//! └── stagehand.log
//! ```
//!
//! The updater may run from any of the three, so the identity is derived from
//! its own executable path with the `-next`/`-temp` suffix normalised away.

use crate::constants::{HASH_MARKER, READY_MARKER, STAGED_SUFFIX, WORKING_COPY_SUFFIX};
use crate::core::UpdateError;
use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// `Vendor/Product` pair naming one installed application.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppIdentity {
    vendor: String,
    product: String,
}

impl AppIdentity {
    /// Create an identity, stripping a `-next` or `-temp` suffix from `product`.
    pub fn new(vendor: impl Into<String>, product: impl AsRef<str>) -> Self {
        Self {
            vendor: vendor.into(),
            product: normalize_product(product.as_ref()).to_string(),
        }
    }

    /// Vendor directory name.
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Product directory name, without any staging suffix.
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Lock name for this identity, safe to use as a file name.
    ///
    /// ```rust
    /// use stagehand::layout::AppIdentity;
    ///
    /// let id = AppIdentity::new("Acme", "Widget-next");
    /// assert_eq!(id.lock_name("runner-"), "runner-Acme-Widget");
    /// ```
    pub fn lock_name(&self, prefix: &str) -> String {
        let raw = format!("{}-{}", self.vendor, self.product);
        let sanitized: String = raw
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        format!("{prefix}{sanitized}")
    }
}

impl fmt::Display for AppIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vendor, self.product)
    }
}

fn normalize_product(name: &str) -> &str {
    name.strip_suffix(STAGED_SUFFIX)
        .or_else(|| name.strip_suffix(WORKING_COPY_SUFFIX))
        .unwrap_or(name)
}

/// The installed / staged / working-copy directories of one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppLayout {
    identity: AppIdentity,
    vendor_dir: PathBuf,
    installed: PathBuf,
    staged: PathBuf,
    working_copy: PathBuf,
}

impl AppLayout {
    /// Build the layout for an application living in `vendor_dir/product`.
    pub fn new(vendor_dir: impl Into<PathBuf>, product: &str) -> Result<Self> {
        let vendor_dir = vendor_dir.into();
        let vendor = vendor_dir
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| UpdateError::InvalidInstallPath {
                path: vendor_dir.display().to_string(),
                reason: "vendor directory has no usable name".to_string(),
            })?
            .to_string();

        let identity = AppIdentity::new(vendor, product);
        let base = identity.product().to_string();

        Ok(Self {
            installed: vendor_dir.join(&base),
            staged: vendor_dir.join(format!("{base}{STAGED_SUFFIX}")),
            working_copy: vendor_dir.join(format!("{base}{WORKING_COPY_SUFFIX}")),
            identity,
            vendor_dir,
        })
    }

    /// Derive the layout from an executable inside any of the three directories.
    ///
    /// ```rust
    /// use stagehand::layout::AppLayout;
    /// use std::path::Path;
    ///
    /// let layout = AppLayout::from_exe(Path::new("/apps/Acme/Widget-temp/stagehand")).unwrap();
    /// assert_eq!(layout.identity().to_string(), "Acme/Widget");
    /// assert_eq!(layout.installed(), Path::new("/apps/Acme/Widget"));
    /// ```
    pub fn from_exe(exe: &Path) -> Result<Self> {
        let invalid = |reason: &str| UpdateError::InvalidInstallPath {
            path: exe.display().to_string(),
            reason: reason.to_string(),
        };

        let app_dir = exe.parent().ok_or_else(|| invalid("executable has no parent directory"))?;
        let product = app_dir
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| invalid("application directory has no usable name"))?;
        let vendor_dir =
            app_dir.parent().ok_or_else(|| invalid("application directory has no parent"))?;

        Self::new(vendor_dir, product)
    }

    /// Derive the layout from the running executable.
    pub fn from_current_exe() -> Result<Self> {
        let exe = std::env::current_exe().context("Failed to get current executable path")?;
        Self::from_exe(&exe)
    }

    /// Application identity.
    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    /// Directory holding the three siblings, the log file, and the config file.
    pub fn vendor_dir(&self) -> &Path {
        &self.vendor_dir
    }

    /// The live installation.
    pub fn installed(&self) -> &Path {
        &self.installed
    }

    /// The pending version.
    pub fn staged(&self) -> &Path {
        &self.staged
    }

    /// Where the promoting updater binary lives.
    pub fn working_copy(&self) -> &Path {
        &self.working_copy
    }

    /// Ready marker inside the staged directory.
    pub fn ready_marker(&self) -> PathBuf {
        self.staged.join(READY_MARKER)
    }

    /// Ready marker as it lands in the installed directory after promotion.
    pub fn installed_ready_marker(&self) -> PathBuf {
        self.installed.join(READY_MARKER)
    }

    /// Hash marker of the live installation.
    pub fn installed_hash_marker(&self) -> PathBuf {
        self.installed.join(HASH_MARKER)
    }

    /// Hash marker written during staging.
    pub fn staged_hash_marker(&self) -> PathBuf {
        self.staged.join(HASH_MARKER)
    }

    /// Whether a committed stage is waiting for promotion.
    pub fn is_ready(&self) -> bool {
        self.ready_marker().is_file()
    }

    /// Path of an executable inside the installed directory.
    pub fn installed_exe(&self, name: &str) -> PathBuf {
        self.installed.join(name)
    }
}
