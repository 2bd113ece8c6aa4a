//! Origin fetching

use crate::error::{FetchError, ProxyError, Result};
use crate::types::{ProxyOptions, RateLimit};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, ETAG};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

/// Body and caching headers of a successful origin response
#[derive(Debug, Clone, Default)]
pub struct OriginResponse {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub etag: Option<String>,
}

/// Capability to fetch a logical path from an origin server
#[async_trait]
pub trait OriginFetch: Send + Sync {
    async fn fetch(&self, path: &str) -> std::result::Result<OriginResponse, FetchError>;
}

/// Bounded request permits, each held for one window after the request starts
struct RateLimiter {
    permits: Arc<Semaphore>,
    window: Duration,
}

impl RateLimiter {
    fn new(limit: RateLimit) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit.max_requests.max(1))),
            window: limit.per,
        }
    }

    async fn throttle(&self) {
        if let Ok(permit) = self.permits.clone().acquire_owned().await {
            let window = self.window;
            tokio::spawn(async move {
                tokio::time::sleep(window).await;
                drop(permit);
            });
        }
    }
}

/// HTTP client for one origin server
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    rate_limiter: Option<RateLimiter>,
}

impl HttpFetcher {
    /// Create a fetcher for `base_url` with the given default headers and rate limit
    pub fn new(base_url: &str, options: &ProxyOptions) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ProxyError::Config(format!("Invalid origin {}: {}", base_url, e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProxyError::Config(format!("Invalid header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ProxyError::Config(format!("Invalid value for {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .map_err(FetchError::from)?;

        Ok(Self {
            client,
            base_url,
            rate_limiter: options.rate_limit.map(RateLimiter::new),
        })
    }

    /// Resolve a logical path against the base URL. The result always stays
    /// on the base URL's origin.
    pub fn url_for(&self, path: &str) -> std::result::Result<Url, FetchError> {
        let raw = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let url = Url::parse(&raw).map_err(|_| FetchError::InvalidUrl(raw.clone()))?;
        if url.origin() != self.base_url.origin() {
            return Err(FetchError::InvalidUrl(raw));
        }
        Ok(url)
    }
}

#[async_trait]
impl OriginFetch for HttpFetcher {
    async fn fetch(&self, path: &str) -> std::result::Result<OriginResponse, FetchError> {
        let url = self.url_for(path)?;

        if let Some(limiter) = &self.rate_limiter {
            limiter.throttle().await;
        }

        debug!(url = %url, "Fetching image from origin");

        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), url = %url, "Origin rejected image request");
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let cache_control = header(CACHE_CONTROL);
        let etag = header(ETAG);

        let body = response.bytes().await?.to_vec();

        debug!(url = %url, size = body.len(), "Fetched image from origin");

        Ok(OriginResponse {
            body,
            content_type,
            cache_control,
            etag,
        })
    }
}
