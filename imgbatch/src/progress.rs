//! Progress reporting for batch runs.
//!
//! The dispatcher drives a [`ProgressReporter`] from its single aggregating task, exactly once per terminal task result, so
//! implementors never observe concurrent or out-of-order updates.

use indicatif::{ProgressBar, ProgressStyle};

use crate::{BatchSummary, TaskResult};

const BAR_TEMPLATE: &str = "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} img ({per_sec}, {eta})";

/// Receiver of batch progress updates.
pub trait ProgressReporter: Send + Sync {
    /// Called once before any task runs.
    fn start(&self, total: u64);

    /// Called once per terminal task result.
    fn advance(&self, result: &TaskResult);

    /// Called once every task has reported.
    fn finish(&self, summary: &BatchSummary);
}

/// A reporter ignoring every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn start(&self, _total: u64) {}
    fn advance(&self, _result: &TaskResult) {}
    fn finish(&self, _summary: &BatchSummary) {}
}

/// Terminal progress bar.
#[derive(Clone)]
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .map(|style| style.progress_chars("█▓░"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());

        let bar = ProgressBar::new(0).with_style(style).with_message("Downloading");

        Self { bar }
    }

    /// Wrap an already configured bar, eg. a hidden one.
    #[inline]
    pub fn with_bar(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for CliProgress {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.reset();
    }

    fn advance(&self, _result: &TaskResult) {
        self.bar.inc(1);
    }

    fn finish(&self, summary: &BatchSummary) {
        if summary.failure_count() == 0 {
            self.bar.finish_with_message("Downloaded");
        } else {
            self.bar.abandon_with_message(format!("{} failed", summary.failure_count()));
        }
    }
}
