//! Sentiment scoring
//!
//! Scoring is a collaborator: anything implementing [`SentimentScorer`]
//! can label a record set. [`LexiconScorer`] is the built-in word-list
//! scorer used by the CLI.

use super::clean::{clean_text, CleanConfig};
use crate::PostRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Compound score at or above which a text is positive
pub const POSITIVE_THRESHOLD: f64 = 0.05;

/// Compound score at or below which a text is negative
pub const NEGATIVE_THRESHOLD: f64 = -0.05;

/// Normalization constant of the compound score
const ALPHA: f64 = 15.0;

/// Valence multiplier for a negated word
const NEGATION_SCALAR: f64 = -0.74;

/// Polarity scores of one text
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentScores {
    /// Negative share, 0..=1
    pub neg: f64,
    /// Neutral share, 0..=1
    pub neu: f64,
    /// Positive share, 0..=1
    pub pos: f64,
    /// Normalized overall polarity, -1..=1
    pub compound: f64,
}

impl SentimentScores {
    /// Label implied by the compound score
    pub fn label(&self) -> SentimentLabel {
        SentimentLabel::from_compound(self.compound)
    }
}

/// Sentiment class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    /// compound >= 0.05
    Positive,
    /// Between the thresholds
    Neutral,
    /// compound <= -0.05
    Negative,
}

impl SentimentLabel {
    /// Classify a compound score
    pub fn from_compound(compound: f64) -> Self {
        if compound >= POSITIVE_THRESHOLD {
            SentimentLabel::Positive
        } else if compound <= NEGATIVE_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment scoring collaborator
pub trait SentimentScorer {
    /// Scores for `text`
    fn score(&self, text: &str) -> SentimentScores;
}

/// One scored record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    /// Record id
    pub post_id: String,
    /// Text that was scored
    pub cleaned_text: String,
    /// Scores
    pub scores: SentimentScores,
    /// Class of the compound score
    pub label: SentimentLabel,
}

/// Clean and score every record
pub fn score_records<S: SentimentScorer + ?Sized>(
    records: &[PostRecord],
    scorer: &S,
    clean: &CleanConfig,
) -> Vec<ScoredRecord> {
    records
        .iter()
        .map(|record| {
            let cleaned_text = clean_text(&record.text, clean);
            let scores = scorer.score(&cleaned_text);
            ScoredRecord {
                post_id: record.post_id.clone(),
                cleaned_text,
                label: scores.label(),
                scores,
            }
        })
        .collect()
}

/// Label distribution and mean scores
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentBreakdown {
    /// Records scored
    pub total: usize,
    /// Positive records
    pub positive: usize,
    /// Neutral records
    pub neutral: usize,
    /// Negative records
    pub negative: usize,
    /// Mean of every score
    pub mean: SentimentScores,
}

impl SentimentBreakdown {
    /// Aggregate scored records
    pub fn from_scored(scored: &[ScoredRecord]) -> Self {
        let mut breakdown = Self {
            total: scored.len(),
            ..Self::default()
        };
        if scored.is_empty() {
            return breakdown;
        }

        for record in scored {
            match record.label {
                SentimentLabel::Positive => breakdown.positive += 1,
                SentimentLabel::Neutral => breakdown.neutral += 1,
                SentimentLabel::Negative => breakdown.negative += 1,
            }
            breakdown.mean.neg += record.scores.neg;
            breakdown.mean.neu += record.scores.neu;
            breakdown.mean.pos += record.scores.pos;
            breakdown.mean.compound += record.scores.compound;
        }

        let n = scored.len() as f64;
        breakdown.mean.neg /= n;
        breakdown.mean.neu /= n;
        breakdown.mean.pos /= n;
        breakdown.mean.compound /= n;
        breakdown
    }

    /// Share of `count` in percent
    pub fn percent(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.total as f64
        }
    }
}

/// Word-list scorer
///
/// Each known word carries a valence in -4..=4. A negator (`not`, `never`,
/// `no`, words ending in `n't`) within the three preceding words dampens and
/// flips the valence. The compound score is `sum / sqrt(sum^2 + 15)`.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    lexicon: HashMap<String, f64>,
}

const DEFAULT_LEXICON: &[(&str, f64)] = &[
    ("amazing", 2.8),
    ("awesome", 3.1),
    ("beautiful", 2.9),
    ("best", 3.2),
    ("better", 1.9),
    ("brilliant", 2.8),
    ("congrats", 2.4),
    ("cool", 1.3),
    ("excellent", 2.7),
    ("excited", 1.4),
    ("fantastic", 2.6),
    ("fun", 2.3),
    ("glad", 2.0),
    ("good", 1.9),
    ("great", 3.1),
    ("happy", 2.7),
    ("helpful", 1.8),
    ("hope", 1.9),
    ("like", 1.5),
    ("love", 3.2),
    ("loved", 2.9),
    ("loving", 2.9),
    ("nice", 1.8),
    ("perfect", 2.7),
    ("proud", 2.1),
    ("thanks", 1.9),
    ("thank", 1.5),
    ("win", 2.8),
    ("wonderful", 2.7),
    ("yay", 2.4),
    ("angry", -2.3),
    ("annoying", -1.7),
    ("awful", -2.0),
    ("bad", -2.5),
    ("boring", -1.3),
    ("broken", -1.9),
    ("crash", -1.7),
    ("disappointed", -1.9),
    ("disappointing", -2.2),
    ("fail", -2.5),
    ("failed", -2.3),
    ("hate", -2.7),
    ("horrible", -2.5),
    ("hurt", -2.4),
    ("lose", -1.7),
    ("lost", -1.3),
    ("problem", -1.7),
    ("sad", -2.1),
    ("scam", -2.2),
    ("slow", -1.0),
    ("sorry", -0.3),
    ("terrible", -2.1),
    ("ugly", -2.3),
    ("unfortunately", -1.4),
    ("worse", -2.1),
    ("worst", -3.1),
    ("wrong", -2.1),
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "without", "aint",
    "cant", "dont", "doesnt", "didnt", "isnt", "wasnt", "arent", "wont", "shouldnt", "couldnt",
    "wouldnt",
];

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_LEXICON.iter().map(|(w, v)| (w.to_string(), *v)))
    }
}

impl LexiconScorer {
    /// Scorer over a custom lexicon; words are lowercased
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            lexicon: pairs
                .into_iter()
                .map(|(word, valence)| (word.to_lowercase(), valence))
                .collect(),
        }
    }

    /// Number of known words
    pub fn len(&self) -> usize {
        self.lexicon.len()
    }

    /// Whether the lexicon is empty
    pub fn is_empty(&self) -> bool {
        self.lexicon.is_empty()
    }
}

fn is_negator(word: &str) -> bool {
    NEGATORS.contains(&word) || word.ends_with("n't")
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> SentimentScores {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return SentimentScores {
                neu: 1.0,
                ..SentimentScores::default()
            };
        }

        let mut sum = 0.0;
        let mut pos_sum = 0.0;
        let mut neg_sum = 0.0;
        let mut neutral = 0usize;

        for (i, word) in words.iter().enumerate() {
            let Some(&base) = self.lexicon.get(word) else {
                neutral += 1;
                continue;
            };
            let negated = words[i.saturating_sub(3)..i].iter().any(|w| is_negator(w));
            let valence = if negated { base * NEGATION_SCALAR } else { base };

            sum += valence;
            if valence > 0.0 {
                pos_sum += valence + 1.0;
            } else if valence < 0.0 {
                neg_sum += valence - 1.0;
            } else {
                neutral += 1;
            }
        }

        let compound = if sum == 0.0 {
            0.0
        } else {
            (sum / (sum * sum + ALPHA).sqrt()).clamp(-1.0, 1.0)
        };

        let total = pos_sum + neg_sum.abs() + neutral as f64;
        SentimentScores {
            neg: neg_sum.abs() / total,
            neu: neutral as f64 / total,
            pos: pos_sum / total,
            compound,
        }
    }
}
