//! Error handling for stagehand
//!
//! This module provides the error taxonomy of the updater and user-friendly
//! error reporting for the command line. The design mirrors two needs:
//! 1. **Strongly-typed errors** so callers can tell an integrity failure from a
//!    locked executable or a failed promotion
//! 2. **User-friendly messages** with actionable suggestions when the process exits
//!
//! # Error Categories
//!
//! - **Integrity**: [`UpdateError::HashFormat`], [`UpdateError::HashMismatch`]
//! - **Environment**: [`UpdateError::DisableTimeout`], [`UpdateError::AlreadyRunning`],
//!   [`UpdateError::InvalidInstallPath`], [`UpdateError::NothingStaged`]
//! - **Promotion**: [`UpdateError::SyncFailed`]
//! - **Plumbing**: [`UpdateError::Transport`], [`UpdateError::Archive`],
//!   [`UpdateError::Config`], [`UpdateError::LaunchFailed`], [`UpdateError::Io`]
//!
//! "No update available" is deliberately absent: it is an ordinary
//! [`DownloadOutcome`](crate::download::DownloadOutcome), not a failure.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stagehand::core::{UpdateError, user_friendly_error};
//!
//! let err = anyhow::Error::from(UpdateError::HashFormat { len: 12 });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::time::Duration;
use thiserror::Error;

/// The main error type for stagehand operations.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// The published hash resource is neither 32 raw bytes nor 64+ hex characters.
    #[error("Server hash is {len} bytes long (expected 32 raw bytes or at least 64 hex characters)")]
    HashFormat {
        /// Length in bytes of the published hash resource
        len: usize,
    },

    /// The downloaded archive does not hash to the published value.
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Published hash, hex-encoded
        expected: String,
        /// Hash of the downloaded bytes, hex-encoded
        actual: String,
    },

    /// The live executable could not be renamed within the retry window.
    #[error("Could not disable {path} within {timeout:?}: {reason}")]
    DisableTimeout {
        /// Path of the live executable
        path: String,
        /// Retry window that elapsed
        timeout: Duration,
        /// Last rename error
        reason: String,
    },

    /// Another updater process already holds the lock for this application.
    #[error("Another instance is already running for {identity}")]
    AlreadyRunning {
        /// Application identity (`Vendor/Product`)
        identity: String,
    },

    /// `update` was invoked but no committed stage exists.
    #[error("No staged update is ready in {path}")]
    NothingStaged {
        /// Staged directory that lacks a ready marker
        path: String,
    },

    /// Promotion started but did not converge.
    #[error("Promotion failed for {failures} file(s); first failure: {first}")]
    SyncFailed {
        /// Number of per-file failures
        failures: usize,
        /// Description of the first failure
        first: String,
    },

    /// The executable does not live in a `Vendor/Product` style directory.
    #[error("Invalid installation path {path}: {reason}")]
    InvalidInstallPath {
        /// Offending path
        path: String,
        /// Why the layout could not be derived
        reason: String,
    },

    /// Fetching bytes from a location failed.
    #[error("Failed to fetch {location}: {reason}")]
    Transport {
        /// Requested location
        location: String,
        /// Underlying failure
        reason: String,
    },

    /// The archive container could not be read or unpacked.
    #[error("Invalid archive: {reason}")]
    Archive {
        /// Underlying failure
        reason: String,
    },

    /// The configuration file or an override could not be parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// An executable could not be started.
    #[error("Failed to launch {path}: {reason}")]
    LaunchFailed {
        /// Executable that failed to start
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// IO error from the standard library.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Clone for UpdateError {
    fn clone(&self) -> Self {
        match self {
            Self::HashFormat {
                len,
            } => Self::HashFormat {
                len: *len,
            },
            Self::HashMismatch {
                expected,
                actual,
            } => Self::HashMismatch {
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::DisableTimeout {
                path,
                timeout,
                reason,
            } => Self::DisableTimeout {
                path: path.clone(),
                timeout: *timeout,
                reason: reason.clone(),
            },
            Self::AlreadyRunning {
                identity,
            } => Self::AlreadyRunning {
                identity: identity.clone(),
            },
            Self::NothingStaged {
                path,
            } => Self::NothingStaged {
                path: path.clone(),
            },
            Self::SyncFailed {
                failures,
                first,
            } => Self::SyncFailed {
                failures: *failures,
                first: first.clone(),
            },
            Self::InvalidInstallPath {
                path,
                reason,
            } => Self::InvalidInstallPath {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::Transport {
                location,
                reason,
            } => Self::Transport {
                location: location.clone(),
                reason: reason.clone(),
            },
            Self::Archive {
                reason,
            } => Self::Archive {
                reason: reason.clone(),
            },
            Self::Config {
                message,
            } => Self::Config {
                message: message.clone(),
            },
            Self::LaunchFailed {
                path,
                reason,
            } => Self::LaunchFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            // io::Error is not Clone; keep the kind and message
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
        }
    }
}

impl UpdateError {
    /// Whether the failure left the installed directory untouched.
    ///
    /// Only errors raised before promotion begins qualify; a [`SyncFailed`]
    /// may leave the installation partially updated.
    ///
    /// [`SyncFailed`]: UpdateError::SyncFailed
    #[must_use]
    pub const fn installation_untouched(&self) -> bool {
        !matches!(self, Self::SyncFailed { .. })
    }
}

/// Error wrapper that adds user-facing details and a suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: UpdateError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: UpdateError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colour.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one applies.
///
/// Typed [`UpdateError`]s anywhere in the `anyhow` chain are recognised;
/// everything else is reported with its full context chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.chain().find_map(|e| e.downcast_ref::<UpdateError>()) {
        return create_error_context(update_error.clone());
    }

    if let Some(io_error) = error.chain().find_map(|e| e.downcast_ref::<std::io::Error>())
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(UpdateError::Io(std::io::Error::new(
            io_error.kind(),
            format!("{error:#}"),
        )))
        .with_suggestion("Check that the installation directory is writable by the current user");
    }

    ErrorContext::new(UpdateError::Io(std::io::Error::other(format!("{error:#}"))))
}

fn create_error_context(error: UpdateError) -> ErrorContext {
    match &error {
        UpdateError::HashFormat { .. } => ErrorContext::new(error)
            .with_details("The .sha256 resource must hold 32 raw bytes or start with 64 hex characters")
            .with_suggestion("Republish the hash file, e.g. with `sha256sum archive.zip > archive.zip.sha256`"),
        UpdateError::HashMismatch { .. } => ErrorContext::new(error)
            .with_details("Nothing was staged; the downloaded archive was discarded")
            .with_suggestion("Make sure the archive and its .sha256 file were published together"),
        UpdateError::DisableTimeout { .. } => ErrorContext::new(error)
            .with_details("The installation was left untouched")
            .with_suggestion("Close the application and run the update again"),
        UpdateError::NothingStaged { .. } => ErrorContext::new(error)
            .with_suggestion("Run `stagehand download <url>` first"),
        UpdateError::AlreadyRunning { .. } => ErrorContext::new(error)
            .with_suggestion("Wait for the other updater process to finish"),
        UpdateError::SyncFailed { .. } => ErrorContext::new(error)
            .with_details("The installation may be partially updated; the staged copy was kept")
            .with_suggestion("Run the update again to finish the promotion"),
        UpdateError::InvalidInstallPath { .. } => ErrorContext::new(error)
            .with_suggestion("Install the application under <vendor>/<product>/ so the updater can find its directories"),
        UpdateError::Transport { .. } => ErrorContext::new(error)
            .with_suggestion("Check the archive URL and your network connection"),
        UpdateError::Config { .. } => ErrorContext::new(error)
            .with_suggestion("Check the TOML syntax in stagehand.toml or unset STAGEHAND_CONFIG"),
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_error_display() {
        let err = UpdateError::HashMismatch {
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert_eq!(err.to_string(), "Hash mismatch: expected aa, got bb");

        let err = UpdateError::AlreadyRunning {
            identity: "Acme/Widget".to_string(),
        };
        assert_eq!(err.to_string(), "Another instance is already running for Acme/Widget");
    }

    #[test]
    fn test_installation_untouched() {
        assert!(
            UpdateError::DisableTimeout {
                path: "widget.exe".to_string(),
                timeout: Duration::from_secs(1),
                reason: "locked".to_string(),
            }
            .installation_untouched()
        );
        assert!(
            !UpdateError::SyncFailed {
                failures: 1,
                first: "x".to_string(),
            }
            .installation_untouched()
        );
    }

    #[test]
    fn test_clone_io_keeps_kind() {
        let err = UpdateError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        match err.clone() {
            UpdateError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected clone: {other:?}"),
        }
    }

    #[test]
    fn test_user_friendly_error_finds_typed_error_under_context() {
        let err: anyhow::Result<()> = Err(UpdateError::HashFormat {
            len: 7,
        })
        .context("Failed to read published hash");

        let ctx = user_friendly_error(err.unwrap_err());
        assert!(matches!(ctx.error, UpdateError::HashFormat { len: 7 }));
        assert!(ctx.suggestion.unwrap().contains("sha256sum"));
    }

    #[test]
    fn test_user_friendly_error_generic() {
        let ctx = user_friendly_error(anyhow::anyhow!("boom"));
        assert!(ctx.to_string().contains("boom"));
        assert!(ctx.suggestion.is_none());
    }
}
