use std::time::Duration;

use crossbind_codegen::{GenerationSummary, StatusReporter};
use indicatif::{ProgressBar, ProgressStyle};

/// Shows the current phase on one terminal line that is replaced in place.
pub struct SpinnerReporter {
    bar: ProgressBar,
}

impl SpinnerReporter {
    pub fn new(hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl StatusReporter for SpinnerReporter {
    fn status(&mut self, message: &str) {
        log::debug!("{message}");
        self.bar.set_message(message.to_string());
    }

    fn finish(&mut self, summary: &GenerationSummary) {
        self.bar.finish_with_message(summary.message());
    }
}

impl Drop for SpinnerReporter {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
