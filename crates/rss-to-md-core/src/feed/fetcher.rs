use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Proxy};
use url::Url;

use crate::config::FetchConfig;
use crate::{Error, Result};

const FEED_ACCEPT: &str =
    "application/rss+xml, application/rdf+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.8";

/// Source of raw feed text
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Retrieve the raw feed content behind an already validated URL
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// Check that a URL is absolute and fetchable over HTTP(S)
pub fn validate_feed_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| {
        Error::InvalidParams(format!("`{}` is not a valid absolute URL: {}", url, e))
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(Error::InvalidParams(format!(
            "unsupported URL scheme `{}` (only http and https are fetched)",
            scheme
        ))),
    }
}

/// HTTP feed fetcher performing a single GET per feed
pub struct FeedFetcher {
    client: Client,
    max_feed_bytes: usize,
}

impl FeedFetcher {
    /// Create a new feed fetcher with configuration
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: Self::build_client(config)?,
            max_feed_bytes: config.max_feed_bytes,
        })
    }

    /// Build HTTP client with optional timeout and proxy
    fn build_client(config: &FetchConfig) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .gzip(true)
            .deflate(true)
            .brotli(true);

        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        if let Some(ref proxy) = config.proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for feed fetching");
        }

        builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));
        headers
    }

    /// Validate a URL string and fetch the feed behind it
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let url = validate_feed_url(url)?;
        self.fetch_url(&url).await
    }

    async fn fetch_url(&self, url: &Url) -> Result<String> {
        tracing::info!("Fetching feed from: {}", url);

        let response = self
            .client
            .get(url.clone())
            .headers(Self::build_headers())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Request failed for {}: {}", url, e);
                Error::Network(format!("Request failed for {}: {}", url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Received {} for {}", status, url);
            return Err(Error::Network(format!("HTTP {} for URL: {}", status, url)));
        }

        if let Some(len) = response.content_length() {
            self.ensure_content_size(len as usize, url)?;
        }

        let body = response.text().await.map_err(|e| {
            tracing::warn!("Failed to read response body from {}: {}", url, e);
            Error::Network(format!("Failed to read response body from {}: {}", url, e))
        })?;

        self.ensure_content_size(body.len(), url)?;

        tracing::debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }

    fn ensure_content_size(&self, size: usize, url: &Url) -> Result<()> {
        if size > self.max_feed_bytes {
            return Err(Error::Network(format!(
                "Feed too large ({} bytes, limit {}) for URL: {}",
                size, self.max_feed_bytes, url
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        self.fetch_url(url).await
    }
}
