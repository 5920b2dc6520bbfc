//! Remote link-checker gate.
//!
//! The checker is a pair of plain GET endpoints. `check` receives the
//! URL-encoded key as a `link` query parameter and answers with a small
//! text or HTML body; two configurable sentinel substrings classify it.
//! A body carrying the "known" marker means the key was posted before; a
//! body carrying the "new" marker means the checker had not seen it.
//! When a key classifies as new, the companion `submit` endpoint is
//! called right away, so the checker-side registration happens during
//! `check` and the gate's `record` has nothing left to do.

use async_trait::async_trait;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, warn};

use super::DedupeGate;
use crate::config::DedupeConfig;
use crate::models::{DedupeDecision, PostedRecord};
use crate::utils::truncate_for_log;

/// Duplicate gate backed by a remote link-checking service.
pub struct RemoteCheckGate {
    client: reqwest::Client,
    check_url: String,
    submit_url: String,
    marker_known: String,
    marker_new: String,
    timeout: Duration,
}

impl RemoteCheckGate {
    /// Build the gate from the dedupe config section. Fails when the
    /// check or submit endpoint is missing.
    pub fn from_config(
        client: reqwest::Client,
        config: &DedupeConfig,
    ) -> Result<Self, Box<dyn Error>> {
        let check_url = config
            .check_url
            .clone()
            .ok_or("remote dedupe needs check_url")?;
        let submit_url = config
            .submit_url
            .clone()
            .ok_or("remote dedupe needs submit_url")?;
        Ok(Self {
            client,
            check_url,
            submit_url,
            marker_known: config.marker_known.clone(),
            marker_new: config.marker_new.clone(),
            timeout: config.timeout(),
        })
    }

    async fn fetch_body(&self, url: &str) -> Result<String, reqwest::Error> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        resp.text().await
    }

    /// Register a freshly seen key with the checker. Best-effort: a
    /// failure here leaves the key unregistered remotely and the run
    /// carries on.
    async fn submit(&self, key: &str) {
        let url = format!("{}?link={}", self.submit_url, urlencoding::encode(key));
        match self.fetch_body(&url).await {
            Ok(body) => {
                debug!(
                    key = %key,
                    body = %truncate_for_log(&body, 120),
                    "Registered key with remote checker"
                );
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Submitting key to remote checker failed");
            }
        }
    }
}

#[async_trait]
impl DedupeGate for RemoteCheckGate {
    async fn check(&self, key: &str) -> DedupeDecision {
        let url = format!("{}?link={}", self.check_url, urlencoding::encode(key));
        let body = match self.fetch_body(&url).await {
            Ok(body) => body,
            Err(e) => {
                return DedupeDecision::unknown(format!("check request failed: {e}"));
            }
        };

        let decision = classify_body(&body, &self.marker_known, &self.marker_new);
        if decision == DedupeDecision::Unique {
            self.submit(key).await;
        }
        decision
    }

    async fn record(&self, record: &PostedRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        debug!(key = %record.key, "Remote checker registered the key at check time");
        Ok(())
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// Classify a checker response body by its sentinel markers.
///
/// The known marker is tested first, so overlapping marker strings still
/// resolve toward the safe side (suppressing a post rather than
/// repeating one). A body matching neither marker is unclassifiable and
/// comes back as [`DedupeDecision::Unknown`].
pub fn classify_body(body: &str, marker_known: &str, marker_new: &str) -> DedupeDecision {
    if body.contains(marker_known) {
        DedupeDecision::Duplicate
    } else if body.contains(marker_new) {
        DedupeDecision::Unique
    } else {
        DedupeDecision::unknown(format!(
            "response matched neither \"{marker_known}\" nor \"{marker_new}\""
        ))
    }
}
