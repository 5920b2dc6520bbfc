//! RSS 2.0 feed source.
//!
//! Parses feeds with `quick-xml`'s serde support. Candidate images for
//! an item are collected from three places, in order: image-typed
//! `enclosure` tags, `media:content`/`media:thumbnail` references, and
//! `<img>` tags inside the description HTML. Media references are taken
//! as-is even without a declared type; the download step rejects
//! anything that does not answer with an image content type.

use async_trait::async_trait;
use quick_xml::de::from_str;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::ArticleSource;
use crate::models::ArticleCandidate;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(default)]
    enclosure: Vec<Enclosure>,
    // quick-xml's serde deserializer sees namespaced elements by their
    // local name, so `media:content` arrives as `content`.
    #[serde(rename = "content", default)]
    media_content: Vec<MediaRef>,
    #[serde(rename = "thumbnail", default)]
    media_thumbnail: Vec<MediaRef>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaRef {
    #[serde(rename = "@url")]
    url: Option<String>,
}

/// Replace HTML entities that are not part of XML before parsing.
/// News feeds sprinkle these into titles and descriptions.
fn scrub_html_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

/// Pull `<img src>` URLs out of an HTML fragment. Relative and `data:`
/// sources are dropped.
fn extract_img_srcs(fragment: &str) -> Vec<String> {
    let html = Html::parse_fragment(fragment);
    let selector = Selector::parse("img[src]").unwrap();
    html.select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .filter(|src| src.starts_with("http"))
        .map(|src| src.to_string())
        .collect()
}

fn collect_item_images(item: &Item) -> Vec<String> {
    let mut urls = Vec::new();
    for enclosure in &item.enclosure {
        let mime = enclosure.mime_type.as_deref().unwrap_or("");
        if let Some(url) = &enclosure.url {
            if mime.starts_with("image/") {
                urls.push(url.clone());
            }
        }
    }
    for media in item.media_content.iter().chain(&item.media_thumbnail) {
        if let Some(url) = &media.url {
            urls.push(url.clone());
        }
    }
    if let Some(description) = &item.description {
        urls.extend(extract_img_srcs(description));
    }
    urls
}

/// Parse an RSS 2.0 document into candidates, feed order preserved.
///
/// Items without a title or link are skipped. A document that does not
/// parse as RSS yields an empty list, not an error.
pub fn parse_feed(xml: &str) -> Vec<ArticleCandidate> {
    let scrubbed = scrub_html_entities(xml);
    let rss: Rss = match from_str(&scrubbed) {
        Ok(rss) => rss,
        Err(e) => {
            warn!(error = %e, "Feed did not parse as RSS, treating as empty");
            return Vec::new();
        }
    };

    let mut candidates = Vec::with_capacity(rss.channel.item.len());
    for item in rss.channel.item {
        let image_urls = collect_item_images(&item);
        let (title, link) = match (item.title, item.link) {
            (Some(title), Some(link)) if !title.trim().is_empty() && !link.trim().is_empty() => {
                (title, link)
            }
            _ => {
                debug!("Skipping feed item without title or link");
                continue;
            }
        };
        candidates.push(ArticleCandidate {
            title: title.trim().to_string(),
            url: link.trim().to_string(),
            image_urls,
        });
    }
    candidates
}

/// Feed source over a single RSS URL.
pub struct RssSource {
    client: reqwest::Client,
    name: String,
    url: String,
    timeout: Duration,
}

impl RssSource {
    pub fn new(
        client: reqwest::Client,
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            name: name.into(),
            url: url.into(),
            timeout,
        }
    }

    /// Source over the Google News search feed for a query.
    pub fn google_news(
        client: reqwest::Client,
        name: impl Into<String>,
        query: &str,
        timeout: Duration,
    ) -> Self {
        let url = format!(
            "https://news.google.com/rss/search?q={}&hl=en-US&gl=US&ceid=US:en",
            urlencoding::encode(query)
        );
        Self::new(client, name, url, timeout)
    }
}

#[async_trait]
impl ArticleSource for RssSource {
    #[instrument(level = "info", skip_all, fields(source = %self.name))]
    async fn discover(&self) -> Result<Vec<ArticleCandidate>, Box<dyn Error + Send + Sync>> {
        debug!(url = %self.url, "Fetching feed");
        let resp = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let body = resp.text().await?;

        let candidates = parse_feed(&body);
        info!(count = candidates.len(), "Discovered article candidates");
        Ok(candidates)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
