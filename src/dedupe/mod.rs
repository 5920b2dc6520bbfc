//! Duplicate-suppression gates.
//!
//! A gate answers one question about a candidate key (always the article
//! URL): has it been posted before? Three implementations share the
//! [`DedupeGate`] trait: a file-backed list ([`LocalListGate`]), a remote
//! link-checking service ([`RemoteCheckGate`]), and [`TieredGate`], which
//! consults the local list before the remote service.
//!
//! `check` never fails. Infrastructure trouble surfaces as
//! [`DedupeDecision::Unknown`] and the call site decides what to do with
//! it; [`first_postable`] treats it as unique and says so in the log.

use async_trait::async_trait;
use std::error::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{DedupeBackend, DedupeConfig};
use crate::models::{ArticleCandidate, DedupeDecision, PostedRecord};

pub mod local;
pub mod remote;

pub use local::LocalListGate;
pub use remote::RemoteCheckGate;

/// A duplicate-suppression gate keyed by article URL.
#[async_trait]
pub trait DedupeGate: Send + Sync {
    /// Classify a key. Transport or protocol trouble comes back as
    /// [`DedupeDecision::Unknown`], never as an error.
    async fn check(&self, key: &str) -> DedupeDecision;

    /// Persist a key after a successful post.
    async fn record(&self, record: &PostedRecord) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Local list in front of the remote checker.
///
/// The local list is the cheap filter: a local hit skips the remote call
/// entirely. Anything else defers to the remote verdict. `record` writes
/// the local store only, because the remote side registers new keys
/// during `check`.
pub struct TieredGate {
    local: LocalListGate,
    remote: RemoteCheckGate,
}

impl TieredGate {
    pub fn new(local: LocalListGate, remote: RemoteCheckGate) -> Self {
        Self { local, remote }
    }
}

#[async_trait]
impl DedupeGate for TieredGate {
    async fn check(&self, key: &str) -> DedupeDecision {
        if let DedupeDecision::Duplicate = self.local.check(key).await {
            return DedupeDecision::Duplicate;
        }
        self.remote.check(key).await
    }

    async fn record(&self, record: &PostedRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.local.record(record).await
    }

    fn name(&self) -> &str {
        "tiered"
    }
}

/// Build the gate the config asks for.
pub async fn build_gate(
    client: &reqwest::Client,
    config: &DedupeConfig,
) -> Result<Box<dyn DedupeGate>, Box<dyn Error>> {
    let gate: Box<dyn DedupeGate> = match config.backend {
        DedupeBackend::Local => Box::new(LocalListGate::open(&config.store_path).await),
        DedupeBackend::Remote => Box::new(RemoteCheckGate::from_config(client.clone(), config)?),
        DedupeBackend::Tiered => Box::new(TieredGate::new(
            LocalListGate::open(&config.store_path).await,
            RemoteCheckGate::from_config(client.clone(), config)?,
        )),
    };
    info!(backend = gate.name(), "Dedupe gate ready");
    Ok(gate)
}

/// Walk candidates in feed order and return the first one the gate lets
/// through.
///
/// Duplicates are skipped. An unknown verdict is logged and the candidate
/// is taken anyway (fail-open): a broken checker must not stop posting.
#[instrument(level = "info", skip_all)]
pub async fn first_postable<'a>(
    gate: &dyn DedupeGate,
    candidates: &'a [ArticleCandidate],
) -> Option<&'a ArticleCandidate> {
    for candidate in candidates {
        match gate.check(&candidate.url).await {
            DedupeDecision::Duplicate => {
                debug!(url = %candidate.url, "Skipping already-posted article");
            }
            DedupeDecision::Unique => {
                info!(url = %candidate.url, title = %candidate.title, "Selected fresh article");
                return Some(candidate);
            }
            DedupeDecision::Unknown { reason } => {
                warn!(
                    url = %candidate.url,
                    reason = %reason,
                    "Dedupe verdict unknown, proceeding as unique"
                );
                return Some(candidate);
            }
        }
    }
    None
}
