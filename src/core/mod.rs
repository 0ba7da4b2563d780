//! Core types for stagehand
//!
//! The core module holds the error taxonomy shared by every stage of an update
//! run. Each operation returns a [`Result`](anyhow::Result); typed
//! [`UpdateError`] values ride inside the `anyhow` chain so callers can
//! classify a failure while still getting the full context trail.
//!
//! ```rust
//! use stagehand::core::UpdateError;
//!
//! let err = UpdateError::AlreadyRunning { identity: "Acme/Widget".into() };
//! assert!(err.installation_untouched());
//! ```

pub mod error;

pub use error::{ErrorContext, UpdateError, user_friendly_error};
