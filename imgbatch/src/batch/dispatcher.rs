use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::FutureExt;
use tokio::sync::mpsc;
use tracing::Instrument;

use super::*;
use crate::config::BatchConfig;
use crate::download::Fetcher;
use crate::progress::{NoopProgress, ProgressReporter};
use crate::task::Pool;

/// Batch download orchestrator.
///
/// A dispatcher turns an ordered sequence of `N` locators into exactly `N` [`TaskResult`]s, running at most
/// `config.max_workers` tasks at once, and reports a [`BatchSummary`] once every task reached a terminal state.
///
/// Tasks are handed out to a fixed-size worker [`Pool`], each worker running its tasks through the [`RetryPolicy`] one at a
/// time. Terminal results are sent back through a channel to a single aggregator, which owns the counters and the progress
/// display. A task failure is only ever counted, it never aborts the batch.
///
/// # Example
/// ```no_run
/// # tokio_test::block_on(async {
/// # use imgbatch::{BatchConfig, Dispatcher, HttpFetcher, DEFAULT_TIMEOUT};
/// let fetcher = HttpFetcher::new(DEFAULT_TIMEOUT).unwrap();
/// let dispatcher = Dispatcher::new(BatchConfig::new("downloaded_images"), fetcher);
///
/// let summary = dispatcher.run(["https://www.kards.com/img/cards/a.png"]).await;
///
/// println!("{summary}");
/// # })
/// ```
#[derive(Debug)]
pub struct Dispatcher<F, P = NoopProgress> {
    config: BatchConfig,
    fetcher: Arc<F>,
    progress: P,
}

impl<F: Fetcher> Dispatcher<F> {
    pub fn new(config: BatchConfig, fetcher: F) -> Self {
        Self {
            config,
            fetcher: Arc::new(fetcher),
            progress: NoopProgress,
        }
    }
}

impl<F: Fetcher, P: ProgressReporter> Dispatcher<F, P> {
    #[inline]
    pub fn with_progress<Q: ProgressReporter>(self, progress: Q) -> Dispatcher<F, Q> {
        Dispatcher {
            config: self.config,
            fetcher: self.fetcher,
            progress,
        }
    }

    #[inline]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Download every locator, returning once all of them reached a terminal state.
    pub async fn run<I>(&self, locators: I) -> BatchSummary
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let locators: Vec<String> = locators.into_iter().map(Into::into).collect();

        let output_dir = self.prepare_output_dir().await;

        let mut summary = BatchSummary {
            total: locators.len(),
            success_count: 0,
            output_dir: output_dir.clone(),
        };

        self.progress.start(summary.total as u64);

        let Some(total) = NonZeroUsize::new(summary.total) else {
            tracing::info!("Nothing to download");

            self.progress.finish(&summary);
            return summary;
        };

        let size = self.config.max_workers.min(total);
        tracing::info!("Downloading {total} files to `{}` with {size} workers", output_dir.display());

        let mut pool = Pool::default();
        pool.start(size);

        let (sender, mut receiver) = mpsc::unbounded_channel();

        for locator in locators {
            let sender = sender.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let policy = self.config.retry;
            let output_dir = output_dir.clone();

            let job = async move {
                let result = match AssertUnwindSafe(execute(&*fetcher, policy, &locator, &output_dir)).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!("Download failed: {locator} | task panicked");

                        TaskResult::failure(locator.as_str(), 0, TaskError::Panicked)
                    }
                };

                // the aggregator outlives every sender
                let _ = sender.send(result);
            };

            let queued = pool.submit(job.in_current_span());

            debug_assert!(queued, "pool is running");
        }

        drop(sender);

        let mut completed = 0;

        while let Some(result) = receiver.recv().await {
            completed += 1;

            if result.succeeded() {
                summary.success_count += 1;
            }

            self.progress.advance(&result);
        }

        pool.close().await;

        if completed != summary.total {
            tracing::error!("{} tasks never reported, counted as failed", summary.total - completed);
        }

        tracing::info!("Downloaded {}/{} files", summary.success_count, summary.total);

        self.progress.finish(&summary);

        summary
    }

    /// Create the output directory and return its absolute path.
    ///
    /// A failure is only logged: every task will then report its own storage error.
    async fn prepare_output_dir(&self) -> PathBuf {
        let output_dir = &self.config.output_dir;

        if let Err(err) = tokio::fs::create_dir_all(output_dir).await {
            tracing::warn!("Cannot create output directory `{}`: {err}", output_dir.display());
        }

        std::path::absolute(output_dir).unwrap_or_else(|_| output_dir.clone())
    }
}

/// Run a single locator to its terminal state.
async fn execute<F: Fetcher>(fetcher: &F, policy: RetryPolicy, locator: &str, output_dir: &Path) -> TaskResult {
    match DownloadTask::new(locator, output_dir) {
        Ok(task) => policy.attempt(fetcher, task).await,
        Err(err) => {
            tracing::warn!("Download failed: {locator} | {err}");

            TaskResult::failure(locator, 0, err)
        }
    }
}
