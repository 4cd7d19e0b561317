//! A batch image downloader.
//!
//! A small crate fetching a list of remote images concurrently to a local directory, providing:
//! - image locator extraction from JSON card exports,
//! - single HTTP fetch attempts bounded by a timeout,
//! - a fixed-count retry policy around them,
//! - storage of payloads through temporary files,
//! - a batch dispatcher running every download on a bounded pool of asynchronous workers.
//!
//! The dispatcher is the heart of the crate. Whatever happens to individual downloads, it produces exactly one terminal result
//! per input locator, never runs more fetches at once than its worker count, and reports an accurate summary once every task
//! has reported. A failed download is isolated and counted, it never aborts the batch.
//!
//! Workers pull tasks from a shared `mpsc` queue guarded by an async `Mutex`, and send their results back through another
//! channel to a single aggregator: the success counter and the progress display are only ever touched by that aggregator, so
//! they need no other synchronization.
//!
//! ```text
//!     locators ──> Dispatcher ──> Pool (max_workers) ──> RetryPolicy ──> Fetcher
//!                      ^                                     │
//!                      │                                     └─> persist::save
//!                      └──────────── TaskResult ◄────────────┘
//! ```

mod batch;
pub use batch::*;

pub mod config;
pub use config::{BatchConfig, Config};

pub mod download;
pub use download::{FetchError, Fetcher, HttpFetcher, DEFAULT_TIMEOUT};

pub mod extract;
pub mod persist;
pub mod progress;
pub mod task;
