//! Blocking HTTP GET on a shared tokio runtime.
//!
//! Uses async reqwest internally with tokio::time::timeout for stall detection,
//! but presents a sync interface: the harvest loop is sequential and every
//! protocol call blocks the calling thread.

use std::sync::LazyLock;
use std::time::Duration;

use futures_util::StreamExt;

/// Connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Stall timeout (no response headers or no body bytes for this long)
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Largest body pre-allocation taken from a Content-Length header
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// HTTP settings (config file defaults, CLI overrides)
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// Maximum silence while waiting for headers or between body chunks
    pub read_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            user_agent: concat!("oaiharvest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Error types for fetch operations
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    /// Connection, TLS, DNS or body decoding failure
    #[error("HTTP error: {0}")]
    Network(String),
    /// Nothing arrived within the read timeout
    #[error("read timeout ({}s with no data)", .0.as_secs())]
    Stalled(Duration),
}

impl FetchError {
    /// Create fetch error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Status {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => Self::Network(error_chain(e)),
        }
    }

    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// reqwest hides the interesting part (refused, reset, dns) in the source chain
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Blocking HTTP client with connection pooling and stall detection.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    read_timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| FetchError::from_reqwest(&e))?;
        Ok(Self {
            client,
            read_timeout: config.read_timeout,
        })
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// HTTP GET → full response body.
    ///
    /// Non-2xx statuses are errors. Each wait (headers, then every body chunk)
    /// is bounded by the read timeout.
    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        SHARED_RUNTIME.handle().block_on(self.get_bytes_async(url))
    }

    async fn get_bytes_async(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = tokio::time::timeout(self.read_timeout, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Stalled(self.read_timeout))?
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let prealloc = response.content_length().unwrap_or(0).min(MAX_PREALLOC);
        let mut body = Vec::with_capacity(prealloc as usize);
        let mut stream = response.bytes_stream();

        loop {
            match tokio::time::timeout(self.read_timeout, stream.next()).await {
                Ok(Some(chunk)) => {
                    let chunk = chunk.map_err(|e| FetchError::from_reqwest(&e))?;
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(_) => return Err(FetchError::Stalled(self.read_timeout)),
            }
        }

        log::trace!("GET {url}: {} bytes", body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert!(config.user_agent.starts_with("oaiharvest/"));
    }

    #[test]
    fn client_builds_from_config() {
        let config = HttpConfig {
            read_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let client = HttpClient::new(&config).unwrap();
        assert_eq!(client.read_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn display_status() {
        let err = FetchError::Status {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP 503: unavailable");
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn display_network() {
        let err = FetchError::Network("connection refused".to_string());
        assert_eq!(format!("{err}"), "HTTP error: connection refused");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn display_stalled() {
        let err = FetchError::Stalled(Duration::from_secs(10));
        assert_eq!(format!("{err}"), "read timeout (10s with no data)");
    }
}
