//! Post-collection analysis
//!
//! - [`clean`] - configurable text cleaning pipeline with presets
//! - [`sentiment`] - scoring collaborator, labels and a built-in lexicon scorer
//! - [`summary`] - aggregate statistics over a record set
//!
//! Plotting is left to consumers of the finalized `Vec<PostRecord>` returned
//! by the collector or [`crate::export::read_dataset`].

pub mod clean;
pub mod sentiment;
pub mod summary;

pub use clean::{clean_text, CleanConfig, CleanPreset, HashtagPolicy};
pub use sentiment::{
    score_records, LexiconScorer, ScoredRecord, SentimentBreakdown, SentimentLabel,
    SentimentScorer, SentimentScores,
};
pub use summary::{DatasetSummary, TypeCounts};
