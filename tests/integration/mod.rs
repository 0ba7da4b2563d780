//! Integration test suite for stagehand
//!
//! End-to-end tests that drive the download and update workflows against real
//! directories, and the compiled binary through `assert_cmd`.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **common**: Publishing helpers shared by the other modules
//! - **end_to_end**: Full download + update cycles through the library API
//! - **cli**: The `stagehand` binary: usage errors, exit codes, the instance lock

mod common;

mod cli;
mod end_to_end;
