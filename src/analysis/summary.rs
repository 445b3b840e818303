//! Dataset summary statistics

use super::clean::{clean_text, word_count, CleanConfig};
use crate::PostRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Post type counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    /// Neither repost, quote nor reply
    pub original: usize,
    /// Reposts
    pub retweets: usize,
    /// Quotes
    pub quotes: usize,
    /// Replies
    pub replies: usize,
}

/// Aggregate view over a record set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetSummary {
    /// Records summarized
    pub total_posts: usize,
    /// Oldest and newest `created_at`, None when no record is dated
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Mean length of the cleaned text in chars
    pub avg_text_length: f64,
    /// Mean word count of the cleaned text
    pub avg_word_count: f64,
    /// Records whose text is empty after cleaning
    pub empty_after_cleaning: usize,
    /// Likes + reposts + replies over all records
    pub total_engagement: u64,
    /// Record count per language code
    pub languages: BTreeMap<String, usize>,
    /// Post type counts
    pub types: TypeCounts,
}

impl DatasetSummary {
    /// Summarize `records`, measuring text after `clean`
    pub fn from_records(records: &[PostRecord], clean: &CleanConfig) -> Self {
        let mut summary = Self {
            total_posts: records.len(),
            ..Self::default()
        };
        if records.is_empty() {
            return summary;
        }

        let mut chars = 0usize;
        let mut words = 0usize;

        for record in records {
            let cleaned = clean_text(&record.text, clean);
            if cleaned.is_empty() {
                summary.empty_after_cleaning += 1;
            }
            chars += cleaned.chars().count();
            words += word_count(&cleaned);

            summary.total_engagement = summary
                .total_engagement
                .saturating_add(record.total_engagement());
            *summary.languages.entry(record.lang.clone()).or_default() += 1;

            if let Some(at) = record.created_at {
                summary.date_range = Some(match summary.date_range {
                    Some((first, last)) => (first.min(at), last.max(at)),
                    None => (at, at),
                });
            }

            if record.is_retweet {
                summary.types.retweets += 1;
            }
            if record.is_quote {
                summary.types.quotes += 1;
            }
            if record.is_reply {
                summary.types.replies += 1;
            }
            if !record.is_retweet && !record.is_quote && !record.is_reply {
                summary.types.original += 1;
            }
        }

        let n = records.len() as f64;
        summary.avg_text_length = chars as f64 / n;
        summary.avg_word_count = words as f64 / n;
        summary
    }

    /// Languages sorted by count descending, then code
    pub fn top_languages(&self) -> Vec<(&str, usize)> {
        let mut langs: Vec<_> = self
            .languages
            .iter()
            .map(|(lang, count)| (lang.as_str(), *count))
            .collect();
        langs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        langs
    }
}
