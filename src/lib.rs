//! # Timeline Harvester Library
//!
//! Resumable collection of public posts from Nitter-style mirror front-ends.
//! Designed for building research datasets that survive interrupted runs.
//!
//! ## Features
//!
//! - **Checkpointed collection**: progress is written atomically after every scroll batch
//! - **Deduplication**: a post is emitted at most once per session, including across resumes
//! - **Type filtering**: keep originals, originals and quotes, or everything
//! - **Defensive extraction**: every field of a post falls back to a documented default
//! - **Idempotent export**: timestamped, incremented, merged or confirmed CSV datasets
//! - **Privacy**: author identifiers are stored only as fixed-width one-way hashes
//!
//! ## Quick Start
//!
//! ```no_run
//! use timeline_harvester::collector::{Collector, Session};
//! use timeline_harvester::export::{ExportMerger, ExportMode};
//! use timeline_harvester::resume::CheckpointStore;
//! use timeline_harvester::surface::NitterSurface;
//! use timeline_harvester::FilterMode;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CheckpointStore::new(".checkpoints");
//! let collector = Collector::new(store);
//! let mut surface = NitterSurface::new("https://nitter.net")?;
//!
//! let session = Session::new("alice", FilterMode::Original, 50);
//! let outcome = collector.collect(session, &mut surface, None).await?;
//!
//! let merger = ExportMerger::new("./data");
//! merger.export(&outcome.records, "alice", ExportMode::Merge)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`extractor`] - Parses one rendered timeline unit into a [`PostRecord`]
//! - [`dedup`] - Session-wide identity index of emitted posts
//! - [`resume`] - Checkpoint persistence with atomic writes and file locking
//! - [`surface`] - Render surface abstraction (HTTP front-end, offline replay)
//! - [`collector`] - Scroll-driven collection state machine with retry and resume
//! - [`export`] - CSV dataset export under a conflict policy
//! - [`analysis`] - Text cleaning, sentiment scoring interface and dataset summaries

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Text cleaning, sentiment scoring and dataset summaries
pub mod analysis;

/// CLI command implementations
pub mod cli;

/// Scroll-driven collection orchestration
pub mod collector;

/// Identity index for already-emitted posts
pub mod dedup;

/// Dataset export
pub mod export;

/// Rendered markup to post record extraction
pub mod extractor;

/// Collection metrics
pub mod metrics;

/// Checkpoint persistence for resumable sessions
pub mod resume;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Render surface abstraction and implementations
pub mod surface;

/// Width of [`PostRecord::author_id_hashed`] in hex characters
pub const AUTHOR_HASH_LEN: usize = 16;

/// Language marker used when detection gives no answer
pub const UNKNOWN_LANG: &str = "und";

/// Timestamp layout used in datasets
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind of media attached to a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image
    Image,
    /// Video or animated GIF
    Video,
}

/// A media attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Attachment kind
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Source URL (empty for videos, which are only counted)
    pub url: String,
    /// Alternative text
    pub alt: String,
}

/// Normalized representation of one collected post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    /// Source post identifier
    pub post_id: String,
    /// Post body
    pub text: String,
    /// Creation time (None when the markup carried no parseable date)
    pub created_at: Option<DateTime<Utc>>,
    /// ISO 639-1 language code or [`UNKNOWN_LANG`]
    pub lang: String,
    /// One-way hash of the author handle, [`AUTHOR_HASH_LEN`] lowercase hex chars
    pub author_id_hashed: String,
    /// Number of reposts
    pub retweet_count: u64,
    /// Number of likes
    pub like_count: u64,
    /// Number of replies
    pub comment_count: u64,
    /// Whether the post replies to another post
    pub is_reply: bool,
    /// Replied-to post id, or the replied-to handle when the markup names only the account
    pub reply_to_id: Option<String>,
    /// Whether the unit is a repost of someone else's post
    pub is_retweet: bool,
    /// Whether the post quotes another post
    pub is_quote: bool,
    /// External links, first-seen order, unique
    pub urls: Vec<String>,
    /// Hashtags including the leading `#`, first-seen order, unique
    pub hashtags: Vec<String>,
    /// Mentions including the leading `@`, first-seen order, unique
    pub mentions: Vec<String>,
    /// Attachments in document order
    pub media: Vec<MediaItem>,
}

impl PostRecord {
    /// Validate record integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.post_id.trim().is_empty() {
            return Err("Post id cannot be empty".to_string());
        }

        if self.post_id.chars().any(char::is_whitespace) {
            return Err(format!("Post id contains whitespace: {:?}", self.post_id));
        }

        if self.author_id_hashed.len() != AUTHOR_HASH_LEN
            || !self
                .author_id_hashed
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(format!(
                "Author hash must be {AUTHOR_HASH_LEN} lowercase hex chars, got {:?}",
                self.author_id_hashed
            ));
        }

        if self.is_reply != self.reply_to_id.is_some() {
            return Err(format!(
                "reply_to_id must be set iff is_reply (is_reply={}, reply_to_id={:?})",
                self.is_reply, self.reply_to_id
            ));
        }

        for (name, values) in [
            ("urls", &self.urls),
            ("hashtags", &self.hashtags),
            ("mentions", &self.mentions),
        ] {
            let mut seen = HashSet::new();
            if let Some(dup) = values.iter().find(|v| !seen.insert(v.as_str())) {
                return Err(format!("Duplicate entry in {name}: {dup}"));
            }
        }

        Ok(())
    }

    /// Short label used in previews ("RETWEET", "QUOTE", "REPLY" or "TWEET")
    pub fn kind_label(&self) -> &'static str {
        if self.is_retweet {
            "RETWEET"
        } else if self.is_quote {
            "QUOTE"
        } else if self.is_reply {
            "REPLY"
        } else {
            "TWEET"
        }
    }

    /// Sum of likes, reposts and replies
    pub fn total_engagement(&self) -> u64 {
        self.like_count
            .saturating_add(self.retweet_count)
            .saturating_add(self.comment_count)
    }
}

/// Which post types a session keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Neither reposts nor quotes
    Original,
    /// Quotes allowed, reposts rejected
    OriginalAndQuotes,
    /// Keep everything
    All,
}

impl FilterMode {
    /// Whether a record passes this filter
    pub fn accepts(&self, record: &PostRecord) -> bool {
        match self {
            FilterMode::Original => !record.is_retweet && !record.is_quote,
            FilterMode::OriginalAndQuotes => !record.is_retweet,
            FilterMode::All => true,
        }
    }

    /// Stable name used in checkpoint keys and the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::Original => "original",
            FilterMode::OriginalAndQuotes => "original_and_quotes",
            FilterMode::All => "all",
        }
    }
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "original" => Ok(FilterMode::Original),
            "original_and_quotes" | "original-and-quotes" => Ok(FilterMode::OriginalAndQuotes),
            "all" => Ok(FilterMode::All),
            _ => Err(format!(
                "Invalid filter mode: {s}. Valid options: original, original_and_quotes, all"
            )),
        }
    }
}
