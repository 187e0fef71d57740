//! Progress bar adapter using indicatif.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};
use photo_cull_core::{BatchSummary, ProgressCallback, ProgressUpdate};

/// Resolution of the overall progress bar.
const BAR_LENGTH: u64 = 1000;

/// Progress reporter for CLI output.
///
/// Renders the batch's overall progress on stderr. Never asks the batch to
/// stop; Ctrl-C cancellation goes through the orchestrator instead.
#[derive(Clone)]
pub struct ProgressBar {
    bar: Option<IndicatifBar>,
    quiet: bool,
}

impl ProgressBar {
    /// Creates a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, suppress all output
    /// * `show_bar` - If true, draw a progress bar; otherwise only the final summary
    #[must_use]
    pub fn new(quiet: bool, show_bar: bool) -> Self {
        if quiet {
            return Self {
                bar: None,
                quiet: true,
            };
        }

        let bar = show_bar.then(|| {
            let bar = IndicatifBar::new(BAR_LENGTH);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}")
            {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        });

        Self { bar, quiet }
    }

    /// Prints the closing line.
    pub fn finish(&self, summary: &BatchSummary, outcome: &str) {
        if self.quiet {
            return;
        }
        let message = format!(
            "{outcome}: {} processed, {} passed, {} rejected, {} grouped, {} errors",
            summary.processed, summary.passed, summary.failed, summary.grouped, summary.errors
        );
        match &self.bar {
            Some(bar) => bar.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

impl ProgressCallback for ProgressBar {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn on_progress(&self, update: &ProgressUpdate) -> bool {
        if let Some(bar) = &self.bar {
            bar.set_position((update.overall.clamp(0.0, 1.0) * BAR_LENGTH as f64) as u64);
            bar.set_message(format!(
                "{} {}/{}",
                update.phase, update.current, update.total
            ));
        }
        true
    }
}
