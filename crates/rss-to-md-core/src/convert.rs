//! Feed conversion pipeline
//!
//! Sequences fetch, parse and render for a single URL. Stage failures are
//! collapsed into [`Error::Processing`] so callers see one error shape.

use crate::config::AppConfig;
use crate::feed::{parse_feed, render_markdown, validate_feed_url, FeedFetcher, FeedSource};
use crate::{Error, Result};

/// Converts feeds behind URLs into Markdown
pub struct Converter<S = FeedFetcher> {
    source: S,
}

impl Converter<FeedFetcher> {
    /// Create a converter that fetches over HTTP
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(FeedFetcher::new(&config.fetch)?))
    }
}

impl<S: FeedSource> Converter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    #[cfg(test)]
    pub(crate) fn source(&self) -> &S {
        &self.source
    }

    /// Fetch, parse and render the feed at `url`.
    ///
    /// A malformed URL fails with [`Error::InvalidParams`] before any fetch is
    /// attempted. Every later failure is returned as [`Error::Processing`].
    pub async fn convert_feed(&self, url: &str) -> Result<String> {
        let url = validate_feed_url(url)?;

        let raw = self
            .source
            .fetch(&url)
            .await
            .map_err(Error::into_processing)?;

        convert_content(&raw).map_err(|e| {
            tracing::warn!("Failed to convert feed from {}: {}", url, e);
            e.into_processing()
        })
    }
}

/// Parse raw feed text and render it, without any I/O
pub fn convert_content(raw: &str) -> Result<String> {
    let channel = parse_feed(raw)?;
    Ok(render_markdown(&channel))
}
