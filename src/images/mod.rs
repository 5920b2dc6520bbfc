//! Image resolution selection.
//!
//! Feed items arrive with duplicate-laden image URL lists that usually
//! point at thumbnails. The selector turns such a list into a bounded
//! set of local files in four steps: deduplicate preserving first-seen
//! order, rewrite known thumbnail URL shapes to their full-resolution
//! form, probe each URL's advertised size with a metadata-only request,
//! then rank and download the best few. A URL whose probe fails stays
//! eligible; it just ranks last.

use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{CONTENT_LENGTH, USER_AGENT};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::ImagesConfig;
use crate::models::{CandidateImage, FetchedImage};

pub mod fetch;

/// Probe fan-out cap. Results are re-joined in input order before
/// ranking, so the cap never changes the outcome, only the pacing.
const PROBE_BATCH_SIZE: usize = 4;

/// Blogger/googleusercontent size path segments: `/s72-c/`, `/s320/`,
/// `/w72-h72-p-k-no-nu/`.
static BLOGGER_SIZE_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:s\d{1,4}(?:-c)?|w\d{1,4}-h\d{1,4}[\w-]*)/").unwrap());

/// WordPress thumbnail filename suffixes: `-150x150.jpg`.
static WORDPRESS_DIM_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)-\d{2,4}x\d{2,4}\.(jpe?g|png|webp|gif)$").unwrap());

/// Drop repeated URLs, keeping the first occurrence of each in its
/// original position.
pub fn dedupe_candidates(urls: &[String]) -> Vec<String> {
    urls.iter().unique().cloned().collect()
}

/// Rewrite a thumbnail URL to its full-resolution form when the URL
/// exposes size tokens; anything unrecognized passes through untouched.
///
/// Blogger-hosted images carry the requested size as a path segment and
/// accept `/s1600/` for the original upload. WordPress thumbnails encode
/// the dimensions in the filename, which the full-size file simply lacks.
pub fn upscale_url(url: &str) -> String {
    let host = match url::Url::parse(url) {
        Ok(parsed) => parsed.host_str().unwrap_or("").to_ascii_lowercase(),
        Err(_) => return url.to_string(),
    };

    if host_in_domain(&host, "googleusercontent.com") || host_in_domain(&host, "blogspot.com") {
        if BLOGGER_SIZE_SEGMENT.is_match(url) {
            return BLOGGER_SIZE_SEGMENT.replace(url, "/s1600/").into_owned();
        }
        return url.to_string();
    }

    WORDPRESS_DIM_SUFFIX.replace(url, ".${1}").into_owned()
}

/// True when `host` is `domain` itself or a subdomain of it.
fn host_in_domain(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

/// Ask the server for the image's size without downloading it.
///
/// Any refusal (transport error, non-2xx, missing or unparsable
/// `Content-Length`) becomes `None`; the candidate is not dropped for it.
async fn probe_size(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    user_agent: &str,
) -> Option<u64> {
    let resp = match client
        .head(url)
        .header(USER_AGENT, user_agent)
        .timeout(timeout)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            debug!(url = %url, error = %e, "Size probe failed");
            return None;
        }
    };
    if !resp.status().is_success() {
        debug!(url = %url, status = %resp.status(), "Size probe refused");
        return None;
    }
    resp.headers()
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Stable sort: biggest advertised size first, ties keep discovery order.
pub fn rank(mut candidates: Vec<CandidateImage>) -> Vec<CandidateImage> {
    candidates.sort_by(|a, b| b.score().cmp(&a.score()));
    candidates
}

/// Picks and downloads the best images for a post.
pub struct ImageSelector {
    client: reqwest::Client,
    config: ImagesConfig,
}

impl ImageSelector {
    pub fn new(client: reqwest::Client, config: ImagesConfig) -> Self {
        Self { client, config }
    }

    /// Narrow raw candidate URLs down to the best `max_images`, in rank
    /// order.
    #[instrument(level = "info", skip_all, fields(raw = raw_urls.len()))]
    pub async fn select(&self, raw_urls: &[String]) -> Vec<CandidateImage> {
        let unique = dedupe_candidates(raw_urls);
        let upscaled: Vec<String> = unique.iter().map(|url| upscale_url(url)).collect();

        let timeout = self.config.probe_timeout();
        let probed: Vec<CandidateImage> = stream::iter(upscaled)
            .map(|url| {
                let client = self.client.clone();
                let user_agent = self.config.user_agent.clone();
                async move {
                    let size_hint = probe_size(&client, &url, timeout, &user_agent).await;
                    debug!(url = %url, size = size_hint.unwrap_or(0), "Probed image candidate");
                    CandidateImage { url, size_hint }
                }
            })
            .buffered(PROBE_BATCH_SIZE)
            .collect()
            .await;

        let selected: Vec<CandidateImage> = rank(probed)
            .into_iter()
            .take(self.config.max_images)
            .collect();
        info!(selected = selected.len(), "Selected image candidates");
        selected
    }

    /// Full pipeline: select, download in rank order, and fall back to
    /// the configured placeholder when nothing survives.
    pub async fn resolve(&self, raw_urls: &[String]) -> Vec<FetchedImage> {
        let selected = self.select(raw_urls).await;
        let fetched = fetch::download_images(&self.client, &self.config, &selected).await;
        if !fetched.is_empty() {
            return fetched;
        }

        if let Some(placeholder) = &self.config.placeholder_url {
            warn!(url = %placeholder, "No candidate image survived, fetching placeholder");
            if let Some(image) =
                fetch::download_image(&self.client, &self.config, placeholder, 0).await
            {
                return vec![image];
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::spawn_server;

    fn candidate(url: &str, size_hint: Option<u64>) -> CandidateImage {
        CandidateImage {
            url: url.to_string(),
            size_hint,
        }
    }

    fn test_config(dir: &std::path::Path) -> ImagesConfig {
        let mut config = ImagesConfig::default();
        config.dir = dir.display().to_string();
        config.probe_timeout_secs = 5;
        config.download_timeout_secs = 5;
        config
    }

    #[test]
    fn test_dedupe_preserves_first_seen_order() {
        let urls = vec![
            "http://ex/x.jpg".to_string(),
            "http://ex/y.jpg".to_string(),
            "http://ex/x.jpg".to_string(),
            "http://ex/z.jpg".to_string(),
        ];
        assert_eq!(
            dedupe_candidates(&urls),
            vec!["http://ex/x.jpg", "http://ex/y.jpg", "http://ex/z.jpg"]
        );
    }

    #[test]
    fn test_upscale_blogger_size_segment() {
        assert_eq!(
            upscale_url("https://1.bp.blogspot.com/-ab/XY/s72-c/photo.jpg"),
            "https://1.bp.blogspot.com/-ab/XY/s1600/photo.jpg"
        );
        assert_eq!(
            upscale_url("https://blogger.googleusercontent.com/img/a/AVX=/w72-h72-p-k-no-nu/photo.jpg"),
            "https://blogger.googleusercontent.com/img/a/AVX=/s1600/photo.jpg"
        );
    }

    #[test]
    fn test_upscale_wordpress_suffix() {
        assert_eq!(
            upscale_url("https://news.example.com/wp-content/uploads/2024/01/pic-150x150.jpg"),
            "https://news.example.com/wp-content/uploads/2024/01/pic.jpg"
        );
    }

    #[test]
    fn test_upscale_leaves_other_urls_alone() {
        let plain = "https://cdn.example.com/photos/full.jpg";
        assert_eq!(upscale_url(plain), plain);
        // A size-looking segment on a non-Blogger host is not touched,
        // including hosts that merely end with the Blogger domain text.
        let lookalike = "https://example.com/s72-c/photo.jpg";
        assert_eq!(upscale_url(lookalike), lookalike);
        let suffix_host = "https://notblogspot.com/s72-c/photo.jpg";
        assert_eq!(upscale_url(suffix_host), suffix_host);
    }

    #[test]
    fn test_rank_orders_by_size_with_stable_ties() {
        let ranked = rank(vec![
            candidate("http://ex/a.jpg", None),
            candidate("http://ex/b.jpg", Some(500)),
            candidate("http://ex/c.jpg", Some(500)),
        ]);
        let urls: Vec<&str> = ranked.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["http://ex/b.jpg", "http://ex/c.jpg", "http://ex/a.jpg"]
        );
    }

    #[test]
    fn test_rank_keeps_failed_probes_eligible() {
        let ranked = rank(vec![
            candidate("http://ex/a.jpg", None),
            candidate("http://ex/b.jpg", None),
        ]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].url, "http://ex/a.jpg");
    }

    #[tokio::test]
    async fn test_select_caps_at_max_images() {
        let server = spawn_server("200 OK", "image/jpeg", b"jpegbytes").await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.max_images = 2;

        let selector = ImageSelector::new(reqwest::Client::new(), config);
        let raw: Vec<String> = (1..=4).map(|i| format!("{server}/p{i}.jpg")).collect();
        let selected = selector.select(&raw).await;
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].size_hint, Some(9));
    }

    #[tokio::test]
    async fn test_resolve_downloads_unique_candidates() {
        let server = spawn_server("200 OK", "image/png", b"pngimagedata").await;
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let selector = ImageSelector::new(reqwest::Client::new(), config);
        let raw = vec![
            format!("{server}/a.png"),
            format!("{server}/a.png"),
            format!("{server}/b.png"),
        ];
        let fetched = selector.resolve(&raw).await;
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].bytes, 12);
        assert!(fetched[0].path.exists());
        assert!(fetched[1].path.exists());
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_placeholder() {
        let broken = spawn_server("404 Not Found", "text/html", b"gone").await;
        let good = spawn_server("200 OK", "image/jpeg", b"placeholderbytes").await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.placeholder_url = Some(format!("{good}/default.jpg"));

        let selector = ImageSelector::new(reqwest::Client::new(), config);
        let fetched = selector.resolve(&[format!("{broken}/x.jpg")]).await;
        assert_eq!(fetched.len(), 1);
        assert!(fetched[0].url.ends_with("default.jpg"));
        assert!(fetched[0].path.exists());

        // An item with no images at all takes the same fallback.
        let fetched = selector.resolve(&[]).await;
        assert_eq!(fetched.len(), 1);
        assert!(fetched[0].url.ends_with("default.jpg"));
    }

    #[tokio::test]
    async fn test_resolve_without_placeholder_can_come_back_empty() {
        let broken = spawn_server("404 Not Found", "text/html", b"gone").await;
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let selector = ImageSelector::new(reqwest::Client::new(), config);
        let fetched = selector.resolve(&[format!("{broken}/x.jpg")]).await;
        assert!(fetched.is_empty());
    }
}
