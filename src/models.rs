//! Data models shared across the posting pipeline.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ArticleCandidate`]: A discovered article before any processing
//! - [`PostedRecord`]: A durable marker for an article that was posted
//! - [`DedupeDecision`]: The three-valued outcome of a duplicate check
//! - [`CandidateImage`]: A discovered image URL with its probed size
//! - [`FetchedImage`]: An image that was downloaded and accepted locally
//!
//! The dedupe key is always the article URL. Earlier generations of this
//! tool mixed titles and URLs between writers and readers of the posted
//! list, which silently disabled deduplication; keying on the URL ends
//! that.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// An article discovered from a feed, before deduplication.
///
/// This is the raw tuple the discovery source hands to the pipeline:
/// a headline, the canonical article URL, and whatever image URLs the
/// feed entry exposed (unfiltered and possibly duplicate-laden).
#[derive(Debug, Clone)]
pub struct ArticleCandidate {
    /// The article headline as the feed presented it.
    pub title: String,
    /// The canonical article URL. Doubles as the dedupe key.
    pub url: String,
    /// Raw candidate image URLs, in discovery order.
    pub image_urls: Vec<String>,
}

/// A durable marker for an article that has been posted.
///
/// Created only after the page post succeeded, then handed to the
/// deduplication gate for write-back. Records are append-only and never
/// expire.
///
/// The local store persists the `key` alone (a JSON array of strings);
/// `posted_at` is carried for logging and for backends that can keep it.
#[derive(Debug, Clone)]
pub struct PostedRecord {
    /// The dedupe key: the article URL.
    pub key: String,
    /// When the post succeeded. Not every backend stores this.
    pub posted_at: Option<DateTime<Utc>>,
}

impl PostedRecord {
    /// Create a record for `key`, stamped with the current time.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            posted_at: Some(Utc::now()),
        }
    }
}

/// Outcome of a duplicate check for one candidate key.
///
/// `Unknown` is produced when the gate could not determine an answer
/// (transport failure, unrecognized response). Call sites treat it as
/// unique and log the reason; an occasional double post is accepted
/// over silently dropping legitimate ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupeDecision {
    /// The key has not been seen before.
    Unique,
    /// The key was already recorded as posted.
    Duplicate,
    /// The check could not be completed; the reason says why.
    Unknown { reason: String },
}

impl DedupeDecision {
    /// Shorthand for building an `Unknown` decision.
    pub fn unknown(reason: impl Into<String>) -> Self {
        DedupeDecision::Unknown {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DedupeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupeDecision::Unique => write!(f, "unique"),
            DedupeDecision::Duplicate => write!(f, "duplicate"),
            DedupeDecision::Unknown { reason } => write!(f, "unknown ({reason})"),
        }
    }
}

/// A discovered image URL plus the size its probe reported.
///
/// `size_hint` is the advertised content length in bytes from a
/// metadata-only probe. `None` means the probe failed or the server
/// omitted the header; such candidates score zero and sort last but
/// stay eligible for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateImage {
    /// The image URL, after any thumbnail rewrite.
    pub url: String,
    /// Advertised size in bytes, if the probe produced one.
    pub size_hint: Option<u64>,
}

impl CandidateImage {
    /// Sort score: the probed size, with failed probes ranked lowest.
    pub fn score(&self) -> u64 {
        self.size_hint.unwrap_or(0)
    }
}

/// A downloaded image accepted for upload.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// The URL the image was fetched from.
    pub url: String,
    /// Local path of the saved file.
    pub path: PathBuf,
    /// Size of the saved file in bytes. Always greater than zero.
    pub bytes: u64,
}
