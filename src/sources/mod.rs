//! Article discovery sources.
//!
//! A source produces [`ArticleCandidate`]s in the order the feed
//! presents them, which downstream code treats as newest-first. The
//! only shipped source is RSS 2.0 ([`RssSource`]), either a plain feed
//! URL or a Google News search feed built from a query.

use async_trait::async_trait;
use std::error::Error;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::models::ArticleCandidate;

pub mod rss;

pub use rss::RssSource;

/// Timeout for the feed fetch, in seconds.
const FEED_TIMEOUT_SECS: u64 = 30;

/// Something that can produce article candidates.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Fetch the current candidate list in feed order. A reachable but
    /// empty or unparsable feed is `Ok(vec![])`; only transport trouble
    /// is an error.
    async fn discover(&self) -> Result<Vec<ArticleCandidate>, Box<dyn Error + Send + Sync>>;

    /// Display name for logs.
    fn name(&self) -> &str;
}

/// Build the source the config asks for.
pub fn build_source(
    client: &reqwest::Client,
    config: &SourceConfig,
) -> Result<Box<dyn ArticleSource>, Box<dyn Error>> {
    let timeout = Duration::from_secs(FEED_TIMEOUT_SECS);
    let source: Box<dyn ArticleSource> = match (&config.feed_url, &config.google_news_query) {
        (Some(url), _) => Box::new(RssSource::new(
            client.clone(),
            config.name.clone(),
            url.clone(),
            timeout,
        )),
        (None, Some(query)) => Box::new(RssSource::google_news(
            client.clone(),
            config.name.clone(),
            query,
            timeout,
        )),
        (None, None) => return Err("source needs feed_url or google_news_query".into()),
    };
    Ok(source)
}
