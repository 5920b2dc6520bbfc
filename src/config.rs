//! Runtime configuration loaded from a YAML file.
//!
//! Every component receives its settings from the structs in this module;
//! nothing reads the process environment at call time. Secrets (API keys,
//! page tokens) may arrive through the CLI's env-backed flags, which
//! `main` folds into the loaded [`Config`] before validation.
//!
//! # Example
//!
//! ```yaml
//! source:
//!   name: rangpur-news
//!   feed_url: https://example.com/feed.xml
//! dedupe:
//!   backend: tiered
//!   store_path: posted_articles.json
//!   check_url: https://checker.example.com/check.php
//!   submit_url: https://checker.example.com/submit.php
//! images:
//!   max_images: 4
//!   dir: images
//!   placeholder_url: https://example.com/default.jpg
//! generation:
//!   model: gemini-2.5-flash
//! social:
//!   page_id: "112233445566"
//! ```

use serde::Deserialize;
use std::error::Error;
use std::time::Duration;
use tokio::fs;

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Where article candidates come from.
    pub source: SourceConfig,
    /// Duplicate-suppression settings.
    #[serde(default)]
    pub dedupe: DedupeConfig,
    /// Image selection and download settings.
    #[serde(default)]
    pub images: ImagesConfig,
    /// Generative-text service settings.
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Social page posting settings.
    #[serde(default)]
    pub social: SocialConfig,
}

/// Candidate discovery settings. Exactly one of `feed_url` and
/// `google_news_query` must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Display name used in logs.
    #[serde(default = "default_source_name")]
    pub name: String,
    /// An RSS 2.0 feed URL.
    #[serde(default)]
    pub feed_url: Option<String>,
    /// A Google News search query; the source builds the search-RSS URL.
    #[serde(default)]
    pub google_news_query: Option<String>,
}

/// Which deduplication gate to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupeBackend {
    /// File-backed list of posted keys.
    #[default]
    Local,
    /// Remote link-checker service.
    Remote,
    /// Local list first, remote service second.
    Tiered,
}

/// Duplicate-suppression settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DedupeConfig {
    /// Gate implementation to use.
    #[serde(default)]
    pub backend: DedupeBackend,
    /// Path of the posted-keys file (local and tiered backends).
    #[serde(default = "default_store_path")]
    pub store_path: String,
    /// Remote check endpoint (remote and tiered backends).
    #[serde(default)]
    pub check_url: Option<String>,
    /// Remote submit endpoint (remote and tiered backends).
    #[serde(default)]
    pub submit_url: Option<String>,
    /// Substring marking a known key in the check response body.
    #[serde(default = "default_marker_known")]
    pub marker_known: String,
    /// Substring marking a newly registered key in the check response body.
    #[serde(default = "default_marker_new")]
    pub marker_new: String,
    /// Timeout for remote check/submit calls, in seconds.
    #[serde(default = "default_dedupe_timeout")]
    pub timeout_secs: u64,
}

impl DedupeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            backend: DedupeBackend::Local,
            store_path: default_store_path(),
            check_url: None,
            submit_url: None,
            marker_known: default_marker_known(),
            marker_new: default_marker_new(),
            timeout_secs: default_dedupe_timeout(),
        }
    }
}

/// Image selection and download settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
    /// How many of the best-ranked images to download.
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    /// Directory downloaded images are written into.
    #[serde(default = "default_images_dir")]
    pub dir: String,
    /// Image fetched when no candidate survives the download step.
    #[serde(default)]
    pub placeholder_url: Option<String>,
    /// Timeout for size probes, in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Timeout for full downloads, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    /// User-Agent header sent on probes and downloads. Several image CDNs
    /// refuse requests without a browser-looking agent.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ImagesConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_images: default_max_images(),
            dir: default_images_dir(),
            placeholder_url: None,
            probe_timeout_secs: default_probe_timeout(),
            download_timeout_secs: default_download_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Generative-text service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// API key. Usually supplied via the `GEMINI_API_KEY` env flag.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Service base URL.
    #[serde(default = "default_generation_base")]
    pub api_base: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            api_base: default_generation_base(),
        }
    }
}

/// Social page posting settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
    /// Target page identifier. Usually supplied via the `FB_PAGE_ID` env flag.
    #[serde(default)]
    pub page_id: Option<String>,
    /// Page access token. Usually supplied via the `FB_ACCESS_TOKEN` env flag.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Graph API base URL, versioned.
    #[serde(default = "default_graph_base")]
    pub api_base: String,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            page_id: None,
            access_token: None,
            api_base: default_graph_base(),
        }
    }
}

fn default_source_name() -> String {
    "feed".to_string()
}

fn default_store_path() -> String {
    "posted_articles.json".to_string()
}

fn default_marker_known() -> String {
    "link-found".to_string()
}

fn default_marker_new() -> String {
    "link-saved".to_string()
}

fn default_dedupe_timeout() -> u64 {
    10
}

fn default_max_images() -> usize {
    4
}

fn default_images_dir() -> String {
    "images".to_string()
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_download_timeout() -> u64 {
    20
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_generation_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_graph_base() -> String {
    "https://graph.facebook.com/v17.0".to_string()
}

/// Load configuration from a YAML file.
pub async fn load(path: &str) -> Result<Config, Box<dyn Error>> {
    let raw = fs::read_to_string(path)
        .await
        .map_err(|e| format!("reading config {path}: {e}"))?;
    let config: Config =
        serde_yaml::from_str(&raw).map_err(|e| format!("parsing config {path}: {e}"))?;
    Ok(config)
}

impl Config {
    /// Parse configuration from a YAML string. Split out of [`load`] so
    /// tests can exercise parsing without a file.
    pub fn from_yaml(raw: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Check cross-field requirements after CLI/env overrides were applied.
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        match (&self.source.feed_url, &self.source.google_news_query) {
            (None, None) => {
                return Err("source needs feed_url or google_news_query".into());
            }
            (Some(_), Some(_)) => {
                return Err("source takes feed_url or google_news_query, not both".into());
            }
            _ => {}
        }

        if matches!(
            self.dedupe.backend,
            DedupeBackend::Remote | DedupeBackend::Tiered
        ) && (self.dedupe.check_url.is_none() || self.dedupe.submit_url.is_none())
        {
            return Err(format!(
                "dedupe backend {:?} needs check_url and submit_url",
                self.dedupe.backend
            )
            .into());
        }

        if self.images.max_images == 0 {
            return Err("images.max_images must be at least 1".into());
        }

        if self.generation.api_key.as_deref().unwrap_or("").is_empty() {
            return Err("generation.api_key missing (set GEMINI_API_KEY)".into());
        }

        if self.social.page_id.as_deref().unwrap_or("").is_empty() {
            return Err("social.page_id missing (set FB_PAGE_ID)".into());
        }
        if self.social.access_token.as_deref().unwrap_or("").is_empty() {
            return Err("social.access_token missing (set FB_ACCESS_TOKEN)".into());
        }

        Ok(())
    }
}
