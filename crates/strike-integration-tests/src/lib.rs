//! Integration test crate for the Strike oracle.
//!
//! This crate has no library code. It only contains integration tests that
//! exercise settlement flows across multiple workspace crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p strike-integration-tests
//! ```
