//! Configuration management for rtpm
//!
//! Two files steer the CLI:
//!
//! 1. **Global Configuration** (`~/.rtpm/config.toml`): user-wide settings,
//!    currently the `[update]` section of the self-update engine
//! 2. **Project Configuration** (`rtpm.toml`): found by walking up from the
//!    working directory; may pin the tool version with `[tool] version`
//!
//! Environment variables (`RTPM_*`) override the global file; see
//! [`crate::update::EnvOverrides`] and [`crate::update::UpdateSettings::resolve`].
//!
//! # Modules
//!
//! - `global` - Global configuration loading and saving
//! - `project` - Project file discovery and the version pin

mod global;
mod project;

pub use global::GlobalConfig;
pub use project::{ProjectConfig, ToolSection};
