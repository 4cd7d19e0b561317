use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io;
use url::Url;

use crate::download::FetchError;
use crate::persist;

mod dispatcher;
pub use dispatcher::*;

mod retry;
pub use retry::*;

/// Terminal reason of a failed task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The locator is not an absolute URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL has no final path segment to name the file after.
    #[error("no file name in URL path")]
    NoFileName,
    /// Every attempt failed, holding the reason of the last one.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The payload could not be written, never retried.
    #[error("storage error: {0}")]
    Storage(#[source] io::Error),
    #[error("task panicked")]
    Panicked,
}

/// One URL's fetch-and-persist unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    url: Url,
    destination: PathBuf,
}

impl DownloadTask {
    /// Create a task storing the payload of `locator` right under `output_dir`.
    pub fn new(locator: &str, output_dir: &Path) -> Result<Self, TaskError> {
        let url = Url::parse(locator)?;
        let destination = output_dir.join(persist::file_name(&url).ok_or(TaskError::NoFileName)?);

        Ok(Self { url, destination })
    }

    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[inline]
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Terminal result of a task.
#[derive(Debug)]
pub struct TaskResult {
    /// The locator as it was handed to the dispatcher.
    pub url: String,
    /// Number of fetch attempts made, `0` when the task could not even be created.
    pub attempts: u8,
    /// `None` on success.
    pub error: Option<TaskError>,
}

impl TaskResult {
    pub fn success(url: impl Into<String>, attempts: u8) -> Self {
        Self {
            url: url.into(),
            attempts,
            error: None,
        }
    }

    pub fn failure(url: impl Into<String>, attempts: u8, error: TaskError) -> Self {
        Self {
            url: url.into(),
            attempts,
            error: Some(error),
        }
    }

    #[inline]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate report over all the tasks of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub success_count: usize,
    /// Absolute path of the output directory.
    pub output_dir: PathBuf,
}

impl BatchSummary {
    #[inline]
    pub fn failure_count(&self) -> usize {
        self.total - self.success_count
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Done! Downloaded {}/{}", self.success_count, self.total)?;
        write!(f, "Images saved to: {}", self.output_dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_task() {
        let task = DownloadTask::new("https://www.kards.com/img/cards/a.png?v=3", Path::new("out")).unwrap();

        assert_eq!(task.url().as_str(), "https://www.kards.com/img/cards/a.png?v=3");
        assert_eq!(task.destination(), Path::new("out/a.png"));
    }

    #[test]
    fn test_download_task_invalid() {
        let err = DownloadTask::new("www.kards.com/img/a.png", Path::new("out")).unwrap_err();
        assert!(matches!(err, TaskError::InvalidUrl(url::ParseError::RelativeUrlWithoutBase)), "{err:?}");

        let err = DownloadTask::new("https://www.kards.com/img/", Path::new("out")).unwrap_err();
        assert!(matches!(err, TaskError::NoFileName), "{err:?}");
    }

    #[test]
    fn test_summary_display() {
        let summary = BatchSummary {
            total: 3,
            success_count: 2,
            output_dir: PathBuf::from("/tmp/images"),
        };

        assert_eq!(summary.failure_count(), 1);
        assert_eq!(summary.to_string(), "Done! Downloaded 2/3\nImages saved to: /tmp/images");
    }
}
