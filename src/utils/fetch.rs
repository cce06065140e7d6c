use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

// Firefox ESR User-Agent string to reduce server-side variance
pub const FIREFOX_UA: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:115.0) Gecko/20100101 Firefox/115.0";

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_BODY_BYTES: u64 = 500 * 1024 * 1024; // 500 MiB

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("response body of {size} bytes exceeds the limit of {limit} bytes")]
    BodyTooLarge { size: u64, limit: u64 },
}

/// Transport settings for outbound document downloads.
///
/// The timeout has no implicit default: every fetcher is built from a
/// config that names one.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_body_bytes: u64,
    pub user_agent: String,
}

impl FetchConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agent: FIREFOX_UA.to_string(),
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: u64) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Status code and raw body of a single GET. The body is left empty for
/// any status other than 200.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

/// Obtains raw bytes for a URL. One call issues one outbound request.
#[allow(async_fn_in_trait)]
pub trait DocumentFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
    max_body_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn check_size(&self, size: u64) -> Result<(), FetchError> {
        if size > self.max_body_bytes {
            return Err(FetchError::BodyTooLarge {
                size,
                limit: self.max_body_bytes,
            });
        }
        Ok(())
    }
}

impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let parsed = url::Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        info!(target: "fetch", url = %parsed, "Starting HTTP fetch");

        let response = self.client.get(parsed.clone()).send().await.map_err(|e| {
            warn!(target: "fetch", url = %parsed, "HTTP transport error: {}", e);
            FetchError::Transport(e)
        })?;

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|s| s.to_string());

        // Only a 200 body is ever decoded; other statuses are reported as-is
        if status_code != 200 {
            info!(target: "fetch", url = %parsed, status = status_code, "Non-200 status; body not read");
            return Ok(FetchResult {
                status_code,
                body: Vec::new(),
                content_type,
            });
        }

        // Reject early when the server announces an oversized body
        if let Some(announced) = response.content_length() {
            if let Err(e) = self.check_size(announced) {
                warn!(target: "fetch", url = %parsed, size = announced, limit = self.max_body_bytes, "Announced body too large; refusing");
                return Err(e);
            }
        }

        // Stream the body so an unannounced oversized response is cut off early
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                warn!(target: "fetch", url = %parsed, "Body read failed: {}", e);
                FetchError::Transport(e)
            })?;
            body.extend_from_slice(&chunk);
            if let Err(e) = self.check_size(body.len() as u64) {
                warn!(target: "fetch", url = %parsed, size = body.len(), limit = self.max_body_bytes, "Body grew past the limit; aborting");
                return Err(e);
            }
        }

        info!(
            target: "fetch",
            url = %parsed,
            status = status_code,
            size = body.len(),
            ct = ?content_type,
            "HTTP fetch completed"
        );

        Ok(FetchResult {
            status_code,
            body,
            content_type,
        })
    }
}
