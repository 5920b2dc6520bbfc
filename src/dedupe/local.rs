//! File-backed posted-keys gate.

use async_trait::async_trait;
use std::error::Error;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::DedupeGate;
use crate::models::{DedupeDecision, PostedRecord};

/// Duplicate gate backed by a JSON array of key strings on disk.
///
/// The whole store is loaded once at construction; `check` is a linear
/// scan of the in-memory list and `record` appends and rewrites the file.
/// There is no cross-process locking, so two runs racing on the same
/// store can both pass the gate.
pub struct LocalListGate {
    path: PathBuf,
    keys: Mutex<Vec<String>>,
}

impl LocalListGate {
    /// Open the store at `path`. A missing or unreadable store starts an
    /// empty list; it is never an error.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let keys = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(keys) => {
                    debug!(
                        path = %path.display(),
                        count = keys.len(),
                        "Loaded posted-keys store"
                    );
                    keys
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Posted-keys store is not a JSON array of strings, starting empty"
                    );
                    Vec::new()
                }
            },
            Err(e) => {
                info!(
                    path = %path.display(),
                    error = %e,
                    "No posted-keys store yet, starting empty"
                );
                Vec::new()
            }
        };
        Self {
            path,
            keys: Mutex::new(keys),
        }
    }
}

#[async_trait]
impl DedupeGate for LocalListGate {
    async fn check(&self, key: &str) -> DedupeDecision {
        let keys = self.keys.lock().await;
        if keys.iter().any(|k| k == key) {
            DedupeDecision::Duplicate
        } else {
            DedupeDecision::Unique
        }
    }

    async fn record(&self, record: &PostedRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut keys = self.keys.lock().await;
        if !keys.iter().any(|k| k == &record.key) {
            keys.push(record.key.clone());
        }
        let raw = serde_json::to_string_pretty(&*keys)?;
        tokio::fs::write(&self.path, raw).await?;
        info!(
            key = %record.key,
            path = %self.path.display(),
            count = keys.len(),
            "Recorded posted key"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_store_checks_unique() {
        let dir = tempfile::tempdir().unwrap();
        let gate = LocalListGate::open(dir.path().join("posted.json")).await;
        assert_eq!(
            gate.check("http://example.com/a").await,
            DedupeDecision::Unique
        );
    }

    #[tokio::test]
    async fn test_corrupt_store_checks_unique() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posted.json");
        std::fs::write(&path, "{not json").unwrap();
        let gate = LocalListGate::open(&path).await;
        assert_eq!(
            gate.check("http://example.com/a").await,
            DedupeDecision::Unique
        );
    }

    #[tokio::test]
    async fn test_record_then_fresh_gate_sees_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posted.json");

        let gate = LocalListGate::open(&path).await;
        gate.record(&PostedRecord::new("http://example.com/a"))
            .await
            .unwrap();

        let fresh = LocalListGate::open(&path).await;
        assert_eq!(
            fresh.check("http://example.com/a").await,
            DedupeDecision::Duplicate
        );
        assert_eq!(
            fresh.check("http://example.com/b").await,
            DedupeDecision::Unique
        );
    }

    #[tokio::test]
    async fn test_store_keeps_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posted.json");

        let gate = LocalListGate::open(&path).await;
        for key in ["http://ex/1", "http://ex/2", "http://ex/3"] {
            gate.record(&PostedRecord::new(key)).await.unwrap();
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        let keys: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(keys, vec!["http://ex/1", "http://ex/2", "http://ex/3"]);
    }

    #[tokio::test]
    async fn test_record_same_key_twice_stores_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posted.json");

        let gate = LocalListGate::open(&path).await;
        gate.record(&PostedRecord::new("http://ex/1")).await.unwrap();
        gate.record(&PostedRecord::new("http://ex/1")).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let keys: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(keys, vec!["http://ex/1"]);
    }
}
