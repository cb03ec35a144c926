//! HTTP client for the Messages API with rate-limit retries.
//!
//! Rate-limited requests (HTTP 429) are resent after a fixed wait. Every other
//! failure is returned to the caller on the first attempt.

use crate::config::Config;
use crate::error::{ForgeError, Result};
use crate::extract::parse_reply;
use crate::request::{ClassificationResult, MessagesRequest, MessagesResponse};
use futures::future::BoxFuture;
use reqwest::{header, Client, StatusCode};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Longest error body kept in an [`ForgeError::EndpointError`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Suspends the caller for the given duration.
///
/// Injected so tests can observe rate-limit waits without sleeping.
pub type Sleeper = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

/// Something that can classify and rewrite a single text.
pub trait Classifier {
    /// Classify `text` and rewrite it as an assertive opinion.
    fn classify(&self, text: &str) -> impl Future<Output = Result<ClassificationResult>> + Send;
}

/// Messages API client.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: Arc<Config>,
    api_key: String,
    sleeper: Sleeper,
    rate_limit_hits: Arc<AtomicU64>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoint", &self.config.endpoint.url)
            .field("model", &self.config.endpoint.model)
            .field("rate_limit_hits", &self.rate_limit_hits())
            .finish_non_exhaustive()
    }
}

enum Attempt {
    Reply(String),
    RateLimited,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let api_key = match config.endpoint.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key.to_string(),
            _ => return Err(ForgeError::MissingCredential),
        };

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_str(&config.endpoint.api_version).map_err(|_| {
                ForgeError::InvalidConfig(format!(
                    "api_version {:?} is not a valid header value",
                    config.endpoint.api_version
                ))
            })?,
        );

        let mut builder = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .default_headers(headers)
            .gzip(true)
            .brotli(true);

        if let Some(timeout) = config.request.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(ForgeError::HttpRequest)?;

        Ok(Self {
            client,
            config,
            api_key,
            sleeper: Arc::new(|duration: Duration| -> BoxFuture<'static, ()> {
                Box::pin(tokio::time::sleep(duration))
            }),
            rate_limit_hits: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Replace the function used to wait out rate limits.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Total rate-limit responses seen by this client and its clones.
    #[must_use]
    pub fn rate_limit_hits(&self) -> u64 {
        self.rate_limit_hits.load(Ordering::Relaxed)
    }

    /// Send a request, resending it while the endpoint answers 429.
    async fn send_with_retry(&self, body: &MessagesRequest) -> Result<String> {
        let retry = &self.config.retry;
        let mut retries: u32 = 0;

        loop {
            match self.send_once(body).await? {
                Attempt::Reply(text) => {
                    if retries > 0 {
                        debug!(retries, "Request succeeded after rate limiting");
                    }
                    return Ok(text);
                }
                Attempt::RateLimited => {
                    self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
                    retries += 1;

                    if let Some(max) = retry.max_retries {
                        if retries > max {
                            warn!(retries = max, "Rate limit persisted, giving up");
                            return Err(ForgeError::RateLimitExhausted { retries: max });
                        }
                    }

                    warn!(
                        retry = retries,
                        wait_secs = retry.rate_limit_wait.as_secs_f64(),
                        "Rate limit hit, waiting before retrying"
                    );
                    (self.sleeper)(retry.rate_limit_wait).await;
                }
            }
        }
    }

    /// Send a single request without retries.
    async fn send_once(&self, body: &MessagesRequest) -> Result<Attempt> {
        let endpoint = &self.config.endpoint;
        trace!(endpoint = %endpoint.url, model = %endpoint.model, "Sending request");

        let response = self
            .client
            .post(&endpoint.url)
            .header("x-api-key", self.api_key.as_str())
            .json(body)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Attempt::RateLimited);
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ForgeError::EndpointError {
                status: status.as_u16(),
                body: truncate(&error_body, MAX_ERROR_BODY_CHARS),
            });
        }

        let envelope: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| ForgeError::InvalidResponse {
                    message: format!("failed to decode response body: {e}"),
                })?;

        match envelope.first_text() {
            Some(text) => Ok(Attempt::Reply(text.to_string())),
            None => Err(ForgeError::InvalidResponse {
                message: "response has no text in its first content block".to_string(),
            }),
        }
    }
}

impl Classifier for ApiClient {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let body = MessagesRequest::for_text(&self.config.endpoint, text);
        let reply = self.send_with_retry(&body).await?;
        parse_reply(&reply)
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
