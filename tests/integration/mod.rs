//! Integration test suite for taskflow.
//!
//! These tests drive the public API end to end: building a job,
//! compiling it, submitting it through a `Gateway` and reading results
//! back.
//!
//! # Test Categories
//!
//! - `submission`: submit, wait, results, output and listing
//! - `flow_control`: replicate, loop and branch wiring through the builder
//! - `session`: connect/disconnect/reconnect, expiry, timeouts, cancellation
//! - `declarative`: `JobContext` and TOML job files against a live gateway
//!
//! # CI Compatibility
//!
//! Every test runs against the in-memory `MockService`; nothing touches
//! the network.

mod fixtures;

mod session;
mod submission;
