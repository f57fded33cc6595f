//! Spinner shown while `rtpm update` talks to the network.
//!
//! Drawn on stderr so stdout stays clean for scripts. Setting
//! `RTPM_NO_PROGRESS` (or passing `--no-progress`) hides it.

use crate::constants::env;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// A running spinner. Dropping it leaves the last frame on screen; call
/// [`Spinner::finish_and_clear`] to remove it.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    /// Starts a spinner showing `message`.
    pub fn start(message: impl Into<String>) -> Self {
        if std::env::var_os(env::NO_PROGRESS).is_some() {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new_spinner();
        match ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            Ok(style) => bar.set_style(style),
            Err(e) => tracing::debug!(error = %e, "Invalid spinner template"),
        }
        bar.set_message(message.into());
        bar.enable_steady_tick(TICK_INTERVAL);
        Self {
            bar,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }

    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}
