//! Social copy generation.
//!
//! The generative service is an opaque HTTP collaborator: one request
//! per run, one response, no retries. Everything that can be checked
//! without a network (the prompt, the response parsing) lives in pure
//! functions.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::GenerationConfig;
use crate::models::ArticleCandidate;
use crate::utils::truncate_for_log;

/// Timeout for the generation call, in seconds.
const GENERATION_TIMEOUT_SECS: u64 = 30;

/// Writes the text of a page post for an article.
#[async_trait]
pub trait CopyWriter: Send + Sync {
    /// Produce the post text. Blank output is an error; the pipeline
    /// never posts an empty message.
    async fn write_post(
        &self,
        article: &ArticleCandidate,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Copy writer backed by the Gemini `generateContent` endpoint.
pub struct GeminiWriter {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiWriter {
    /// Build the writer from the generation config section. Fails when
    /// the API key is missing.
    pub fn from_config(
        client: reqwest::Client,
        config: &GenerationConfig,
    ) -> Result<Self, Box<dyn Error>> {
        let api_key = config.api_key.clone().ok_or("generation api_key missing")?;
        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            api_base: config.api_base.clone(),
        })
    }
}

/// Build the generation prompt for an article.
pub fn build_prompt(article: &ArticleCandidate) -> String {
    format!(
        "Write a short, engaging social media post for a news page about the \
         article titled \"{}\". Summarize the key point in one or two \
         sentences, add 3-5 relevant hashtags, and end with the link {} on \
         its own line. Plain text only, no markdown.",
        article.title, article.url
    )
}

/// Pull the generated text out of a `generateContent` response body.
/// Joins multi-part candidates; a blank result is `None`.
pub fn extract_text(body: &Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl CopyWriter for GeminiWriter {
    async fn write_post(
        &self,
        article: &ArticleCandidate,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        // The key rides in the query string; never log the URL.
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(article) }] }]
        });

        debug!(model = %self.model, title = %article.title, "Requesting post copy");
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .timeout(Duration::from_secs(GENERATION_TIMEOUT_SECS))
            .send()
            .await?
            .error_for_status()?;
        let payload: Value = resp.json().await?;

        let text = match extract_text(&payload) {
            Some(text) => text,
            None => return Err("generation response carried no text".into()),
        };
        info!(chars = text.len(), "Generated post copy");
        debug!(preview = %truncate_for_log(&text, 200), "Generated copy");
        Ok(text)
    }
}
