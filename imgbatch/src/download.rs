use std::future::Future;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::stream::TryStreamExt;
use thiserror::Error;

pub use reqwest::{Client, StatusCode};
pub use url::Url;

/// User agent sent along every request, some image hosts reject unidentified clients.
pub const USER_AGENT: &str = "Mozilla/5.0";

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// A failed fetch attempt, always worth retrying.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS, timeout or body streaming failure.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    /// The server answered with a non-2xx status.
    #[error("unexpected HTTP status: {0}")]
    Status(StatusCode),
}

impl FetchError {
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_timeout())
    }
}

/// A single network retrieval attempt.
///
/// Implementors must not touch the filesystem and must resolve in bounded time.
pub trait Fetcher: Send + Sync + 'static {
    /// Retrieve the whole payload behind `url` in memory.
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

/// HTTP(S) fetcher backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher whose requests, body included, give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).user_agent(USER_AGENT).build()?;

        Ok(Self { client })
    }

    #[inline]
    pub fn with_client(self, client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Bytes, FetchError> {
        let resp = self.client.get(url.clone()).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let mut body = BytesMut::new();
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.try_next().await? {
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n not really an image";

    fn url(server: &MockServer, path: &str) -> Url {
        Url::parse(&format!("{}{path}", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/img/cards/a.png"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(DEFAULT_TIMEOUT).unwrap();
        let bytes = fetcher.fetch(&url(&server, "/img/cards/a.png?v=2")).await.unwrap();

        assert_eq!(&bytes[..], PNG);
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(DEFAULT_TIMEOUT).unwrap();
        let err = fetcher.fetch(&url(&server, "/missing.png")).await.unwrap_err();

        assert!(matches!(err, FetchError::Status(StatusCode::NOT_FOUND)), "{err:?}");
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_millis(200)).unwrap();

        let started = std::time::Instant::now();
        let err = fetcher.fetch(&url(&server, "/slow.png")).await.unwrap_err();

        assert!(err.is_timeout(), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // tcpmux port, nothing listens there
        let target = Url::parse("http://127.0.0.1:1/gone.png").unwrap();

        let fetcher = HttpFetcher::new(DEFAULT_TIMEOUT).unwrap().with_client(Client::new());
        let err = fetcher.fetch(&target).await.unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)), "{err:?}");
    }
}
