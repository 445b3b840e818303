//! Dataset summary subcommand

use super::{CliError, OutputFormat};
use crate::analysis::{
    score_records, CleanPreset, DatasetSummary, HashtagPolicy, LexiconScorer, SentimentBreakdown,
};
use crate::export::read_dataset;
use clap::Parser;
use std::path::PathBuf;

/// Arguments of the summarize command
#[derive(Parser, Debug)]
pub struct SummarizeArgs {
    /// Dataset CSV written by `collect`
    #[arg(long)]
    pub dataset: PathBuf,

    /// Text cleaning preset: standard, minimal or aggressive
    #[arg(long, default_value = "standard")]
    pub clean: CleanPreset,

    /// Override the preset's hashtag handling: symbol, complete or keep
    #[arg(long)]
    pub hashtags: Option<HashtagPolicy>,

    /// Also score sentiment with the built-in lexicon
    #[arg(long, default_value_t = false)]
    pub sentiment: bool,
}

impl SummarizeArgs {
    /// Execute the summarize command
    pub fn execute(&self, format: OutputFormat) -> Result<(), CliError> {
        if !self.dataset.is_file() {
            return Err(CliError::InvalidArgument(format!(
                "Dataset not found: {}",
                self.dataset.display()
            )));
        }

        let records = read_dataset(&self.dataset)?;
        let mut clean = self.clean.config();
        if let Some(policy) = self.hashtags {
            clean.hashtags = policy;
        }

        let summary = DatasetSummary::from_records(&records, &clean);
        let sentiment = self.sentiment.then(|| {
            let scored = score_records(&records, &LexiconScorer::default(), &clean);
            SentimentBreakdown::from_scored(&scored)
        });

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "dataset": self.dataset.display().to_string(),
                    "summary": summary,
                    "sentiment": sentiment,
                });
                println!("{output}");
            }
            OutputFormat::Human => print_human(&summary, sentiment.as_ref()),
        }
        Ok(())
    }
}

fn print_human(summary: &DatasetSummary, sentiment: Option<&SentimentBreakdown>) {
    println!("\n{}", "=".repeat(60));
    println!("DATASET SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Total posts: {}", summary.total_posts);
    if let Some((first, last)) = summary.date_range {
        println!("Date range: {first} to {last}");
    }
    println!("Avg text length: {:.1} chars", summary.avg_text_length);
    println!("Avg word count: {:.1}", summary.avg_word_count);
    if summary.empty_after_cleaning > 0 {
        println!("Empty after cleaning: {}", summary.empty_after_cleaning);
    }
    println!("Total engagement: {}", summary.total_engagement);

    let types = &summary.types;
    println!(
        "Types: {} original, {} retweets, {} quotes, {} replies",
        types.original, types.retweets, types.quotes, types.replies
    );

    let languages = summary.top_languages();
    if !languages.is_empty() {
        println!("Languages:");
        for (lang, count) in languages.iter().take(5) {
            println!("  {lang}: {count}");
        }
    }

    if let Some(breakdown) = sentiment {
        println!("\nSentiment distribution:");
        for (label, count) in [
            ("Positive", breakdown.positive),
            ("Neutral", breakdown.neutral),
            ("Negative", breakdown.negative),
        ] {
            println!("  {label}: {count} ({:.2}%)", breakdown.percent(count));
        }
        println!("Average scores:");
        println!("  Positive: {:.4}", breakdown.mean.pos);
        println!("  Neutral: {:.4}", breakdown.mean.neu);
        println!("  Negative: {:.4}", breakdown.mean.neg);
        println!("  Compound: {:.4}", breakdown.mean.compound);
    }
    println!("{}", "=".repeat(60));
}
