use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::util::{is_protocol_change, same_location};

/// Default cap on a feed body.
pub const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving a feed document.
///
/// The `Display` text of every variant is what ends up in a feed source's
/// crawl status when the transport fails, so keep it short and readable.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx, non-redirect status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Redirect chain longer than the configured limit
    #[error("Too many redirects (max {0})")]
    TooManyRedirects(usize),
    /// Redirect chain revisits a URL
    #[error("Redirect loop detected at {0}")]
    RedirectLoop(String),
    /// Feed URL or redirect target could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Per-request knobs handed to a [`FeedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Applies to each hop, body included.
    pub timeout: Duration,
    pub max_bytes: usize,
    pub max_redirects: usize,
    pub redirects: RedirectMode,
}

/// Which redirect hops a fetch may follow.
///
/// A hop that is not followed is returned as-is: the 3xx status, an empty
/// body and `final_url` set to its `Location` target. The target itself is
/// never requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// Follow every hop.
    Follow,
    /// Follow only hops to the requested URL itself or its http/https
    /// counterpart.
    ProtocolSwitchOnly,
    /// Never follow.
    Stop,
}

impl RedirectMode {
    fn permits(self, requested: &str, next: &Url) -> bool {
        match self {
            RedirectMode::Follow => true,
            RedirectMode::ProtocolSwitchOnly => {
                same_location(requested, next.as_str()) || is_protocol_change(requested, next.as_str())
            }
            RedirectMode::Stop => false,
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_bytes: MAX_FEED_SIZE,
            max_redirects: 5,
            redirects: RedirectMode::ProtocolSwitchOnly,
        }
    }
}

/// Raw result of a fetch. `final_url` differs from the requested URL
/// whenever a redirect was followed or refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub status: u16,
    pub body: Vec<u8>,
    pub final_url: String,
}

impl FetchedDocument {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// Source of feed documents.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedDocument, FetchError>;
}

/// reqwest-backed transport.
///
/// Automatic redirects are disabled on the client; hops are followed here
/// so the final URL is never hidden from the caller.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::none())
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_hop(&self, url: &Url, options: &FetchOptions) -> Result<Hop, FetchError> {
        tokio::time::timeout(options.timeout, self.send_hop(url, options.max_bytes))
            .await
            .map_err(|_| FetchError::Timeout)?
    }

    async fn send_hop(&self, url: &Url, max_bytes: usize) -> Result<Hop, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Ok(Hop {
                status: status.as_u16(),
                location,
                body: Vec::new(),
            });
        }
        if !status.is_success() {
            // Error bodies are never parsed.
            return Ok(Hop {
                status: status.as_u16(),
                location: None,
                body: Vec::new(),
            });
        }

        let body = read_limited_bytes(response, max_bytes).await?;
        Ok(Hop {
            status: status.as_u16(),
            location: None,
            body,
        })
    }
}

/// One request/response in a redirect chain.
struct Hop {
    status: u16,
    location: Option<String>,
    body: Vec<u8>,
}

#[async_trait]
impl FeedTransport for HttpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedDocument, FetchError> {
        let mut current = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        let mut visited = vec![current.clone()];

        loop {
            let Hop {
                status,
                location,
                body,
            } = self.fetch_hop(&current, options).await?;

            let Some(location) = location else {
                // Without a redirect the caller gets its own spelling back.
                let final_url = if visited.len() == 1 {
                    url.to_string()
                } else {
                    current.to_string()
                };
                return Ok(FetchedDocument {
                    status,
                    body,
                    final_url,
                });
            };

            let next = current
                .join(&location)
                .map_err(|e| FetchError::InvalidUrl(format!("{location}: {e}")))?;

            if !options.redirects.permits(url, &next) {
                tracing::debug!(from = %current, to = %next, "Redirect not followed");
                return Ok(FetchedDocument {
                    status,
                    body,
                    final_url: next.to_string(),
                });
            }
            if visited.len() > options.max_redirects {
                return Err(FetchError::TooManyRedirects(options.max_redirects));
            }
            if visited.contains(&next) {
                return Err(FetchError::RedirectLoop(next.to_string()));
            }

            tracing::debug!(
                from = %current,
                to = %next,
                hop = visited.len(),
                "Following redirect"
            );
            visited.push(next.clone());
            current = next;
        }
    }
}

pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // EDGE-005: A dropped connection can end the stream early without an error.
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
