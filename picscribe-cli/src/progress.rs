use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use picscribe::pipeline::{redact_path, ProgressEvent, ProgressReporter};

/// Progress bar on stderr driven by pipeline events.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{elapsed_precise}] {pos}/{len} images ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for BarProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { total } => {
                self.bar.set_length(total as u64);
                self.bar.set_position(0);
            }
            ProgressEvent::Phase { path, phase } => {
                self.bar
                    .set_message(format!("{} {}", phase.label(), redact_path(&path)));
            }
            ProgressEvent::Finished { outcome } => {
                // Watch mode keeps finding files past the initial total.
                if self.bar.position() >= self.bar.length().unwrap_or(0) {
                    self.bar.inc_length(1);
                }
                self.bar.inc(1);
                self.bar.set_message(redact_path(outcome.path()));
            }
        }
    }
}
