use std::num::{NonZeroU8, NonZeroUsize};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use imgbatch::config::{self, Config};
use imgbatch::progress::CliProgress;
use imgbatch::{extract, Dispatcher, HttpFetcher};

/// Download every card image listed in a JSON card export.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON card export to read image paths from.
    #[arg(long, env = "IMGBATCH_JSON_PATH", default_value = config::DEFAULT_JSON_PATH)]
    json_path: PathBuf,

    /// Directory to save images into, created when missing.
    #[arg(long, env = "IMGBATCH_OUTPUT_DIR", default_value = config::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Host relative image paths are resolved against.
    #[arg(long, env = "IMGBATCH_DOMAIN_PREFIX", default_value = config::DEFAULT_DOMAIN_PREFIX)]
    domain_prefix: String,

    /// Maximum number of concurrent downloads.
    #[arg(long, env = "IMGBATCH_MAX_WORKERS", default_value_t = config::DEFAULT_MAX_WORKERS)]
    max_workers: NonZeroUsize,

    /// Per-attempt timeout, in seconds.
    #[arg(long, env = "IMGBATCH_TIMEOUT", default_value_t = imgbatch::DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Maximum number of attempts per image.
    #[arg(long, env = "IMGBATCH_RETRIES", default_value_t = imgbatch::DEFAULT_MAX_ATTEMPTS)]
    retries: NonZeroU8,

    /// Base delay between attempts, in milliseconds, doubled after each failure.
    #[arg(long, env = "IMGBATCH_BACKOFF_MS", default_value_t = 0)]
    backoff_ms: u64,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            json_path: args.json_path,
            output_dir: args.output_dir,
            domain_prefix: args.domain_prefix,
            max_workers: args.max_workers,
            timeout: Duration::from_secs(args.timeout),
            retries: args.retries,
            backoff: Duration::from_millis(args.backoff_ms),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from(Args::parse());

    println!("Parsing JSON file...");

    let locators = extract::from_path(&config.json_path, &config.domain_prefix)
        .await
        .with_context(|| format!("failed to parse JSON file `{}`", config.json_path.display()))?;

    println!("Found {} images", locators.len());

    let fetcher = HttpFetcher::new(config.timeout).context("failed to build HTTP client")?;
    let dispatcher = Dispatcher::new(config.batch(), fetcher).with_progress(CliProgress::new());

    let summary = dispatcher.run(locators).await;

    println!("\n{summary}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_default_args() {
        let config = Config::from(Args::try_parse_from(["imgbatch"]).unwrap());

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_custom_args() {
        let args = Args::try_parse_from([
            "imgbatch",
            "--json-path",
            "export.json",
            "--output-dir",
            "out",
            "--max-workers",
            "2",
            "--timeout",
            "5",
            "--retries",
            "4",
            "--backoff-ms",
            "250",
        ])
        .unwrap();

        let config = Config::from(args);

        assert_eq!(config.json_path, PathBuf::from("export.json"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.max_workers.get(), 2);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retries.get(), 4);
        assert_eq!(config.backoff, Duration::from_millis(250));
    }

    #[test]
    fn test_zero_rejected() {
        assert!(Args::try_parse_from(["imgbatch", "--max-workers", "0"]).is_err());
        assert!(Args::try_parse_from(["imgbatch", "--retries", "0"]).is_err());
    }
}
