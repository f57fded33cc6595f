//! Integration test suite for rtpm.
//!
//! These tests exercise the update engine the way it runs in production: real
//! processes contending for the installation lock, archives served over HTTP
//! by a mock release server, and the `rtpm` binary itself.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! cargo test --test integration lock::
//! ```
//!
//! # Test Organization
//!
//! - `lock` - cross-process exclusivity of the update lock and release on process death
//! - `update_flow` - check, fetch, verify and install against a mock server
//! - `cli` - commands, flags, JSON output and error reporting of the binary

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod lock;
mod update_flow;
