//! Cross-platform utilities used by the update engine and the CLI.

pub mod platform;
pub mod progress;

pub use platform::{current_exe, executable_name, install_dir_from_exe, platform_id};
pub use progress::Spinner;
