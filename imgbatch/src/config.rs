//! Run configuration, passed explicitly to the components that need it.

use std::num::{NonZeroU8, NonZeroUsize};
use std::path::PathBuf;
use std::time::Duration;

use crate::download::DEFAULT_TIMEOUT;
use crate::RetryPolicy;

pub const DEFAULT_JSON_PATH: &str = "./cards.json";
pub const DEFAULT_OUTPUT_DIR: &str = "downloaded_images";
pub const DEFAULT_DOMAIN_PREFIX: &str = "www.kards.com";
pub const DEFAULT_MAX_WORKERS: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(workers) => workers,
    None => unreachable!(),
};

/// Whole program configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// JSON document listing the images.
    pub json_path: PathBuf,
    /// Directory the images are saved into.
    pub output_dir: PathBuf,
    /// Host prepended to relative image paths.
    pub domain_prefix: String,
    /// Maximum number of concurrent downloads.
    pub max_workers: NonZeroUsize,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Maximum number of attempts per image.
    pub retries: NonZeroU8,
    /// Base delay between attempts, none by default.
    pub backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            json_path: PathBuf::from(DEFAULT_JSON_PATH),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            domain_prefix: DEFAULT_DOMAIN_PREFIX.to_owned(),
            max_workers: DEFAULT_MAX_WORKERS,
            timeout: DEFAULT_TIMEOUT,
            retries: crate::DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::ZERO,
        }
    }
}

impl Config {
    /// Extract the part of the configuration the dispatcher runs with.
    pub fn batch(&self) -> BatchConfig {
        BatchConfig {
            output_dir: self.output_dir.clone(),
            max_workers: self.max_workers,
            retry: RetryPolicy::new(self.retries).with_backoff(self.backoff),
        }
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub output_dir: PathBuf,
    pub max_workers: NonZeroUsize,
    pub retry: RetryPolicy,
}

impl BatchConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_workers: DEFAULT_MAX_WORKERS,
            retry: RetryPolicy::default(),
        }
    }

    #[inline]
    pub fn with_max_workers(self, max_workers: NonZeroUsize) -> Self {
        Self { max_workers, ..self }
    }

    #[inline]
    pub fn with_retry(self, retry: RetryPolicy) -> Self {
        Self { retry, ..self }
    }
}
