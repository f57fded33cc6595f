//! Unit test suite for rtpm.
//!
//! Fast tests of the public API that need no network and no child processes.
//! Tests that read or change process environment variables are marked
//! `#[serial]`.
//!
//! ```bash
//! cargo test --test unit
//! ```

mod errors;
mod settings;
