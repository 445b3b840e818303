//! Collect command and top-level CLI definition

use crate::collector::config::{
    DEFAULT_MAX_STALL, DEFAULT_SCROLL_BUDGET, FETCH_TIMEOUT_SECS, MAX_RETRIES, SCROLL_DELAY_MS,
};
use crate::collector::{CollectOutcome, Collector, Session};
use crate::export::{ExportMerger, ExportMode, ExportOutcome};
use crate::extractor::cache::normalize_handle;
use crate::resume::CheckpointStore;
use crate::shutdown::SharedShutdown;
use crate::surface::nitter::DEFAULT_INSTANCE;
use crate::surface::{NitterSurface, RenderSurface, ReplaySurface};
use crate::{FilterMode, PostRecord, CREATED_AT_FORMAT};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::confirm::StdinConfirm;
use super::{CheckpointsCommand, CliError, SummarizeArgs};

/// Records shown in the human-readable preview
const PREVIEW_RECORDS: usize = 5;

/// Characters of text shown per previewed record
const PREVIEW_CHARS: usize = 100;

/// Timeline harvester CLI
#[derive(Parser, Debug)]
#[command(name = "timeline-harvester")]
#[command(about = "Collect public timelines from Nitter front-ends into CSV datasets", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Checkpoint directory
    #[arg(long, global = true, default_value = ".checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Maximum number of retries for a failed fetch (default: 3, range: 1-20)
    #[arg(long, global = true, default_value_t = MAX_RETRIES, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: u32,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect a timeline and export it
    Collect(CollectArgs),

    /// Inspect or clear saved checkpoints
    Checkpoints(CheckpointsCommand),

    /// Summarize an exported dataset
    Summarize(SummarizeArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Arguments of the collect command
#[derive(Parser, Debug)]
pub struct CollectArgs {
    /// Account to collect (with or without the leading @)
    #[arg(long)]
    pub target: String,

    /// Scroll budget: maximum number of batches, counted across resumes
    #[arg(long, default_value_t = DEFAULT_SCROLL_BUDGET, value_parser = clap::value_parser!(u32).range(1..))]
    pub scrolls: u32,

    /// Post types to keep: original, original_and_quotes or all
    #[arg(long, default_value = "original")]
    pub filter: FilterMode,

    /// Consecutive batches without a new post before stopping
    #[arg(long, default_value_t = DEFAULT_MAX_STALL, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_stall: u32,

    /// Nitter instance base URL
    #[arg(long, default_value = DEFAULT_INSTANCE)]
    pub instance: String,

    /// Replay saved HTML pages from this directory instead of fetching
    #[arg(long, conflicts_with = "instance")]
    pub replay: Option<PathBuf>,

    /// Directory receiving the dataset
    #[arg(long, default_value = "data")]
    pub out_dir: PathBuf,

    /// Export mode: timestamp, increment, merge or ask
    #[arg(long, default_value = "timestamp")]
    pub export: ExportMode,

    /// Dataset base name (default: {target}_tweets)
    #[arg(long)]
    pub name: Option<String>,

    /// Skip the export step; records stay in the checkpoint
    #[arg(long, default_value_t = false)]
    pub no_export: bool,

    /// Timeout of one page fetch in seconds
    #[arg(long, default_value_t = FETCH_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub fetch_timeout_secs: u64,

    /// Pause between batches in milliseconds
    #[arg(long, default_value_t = SCROLL_DELAY_MS)]
    pub scroll_delay_ms: u64,
}

impl CollectArgs {
    /// Dataset base name for this target
    pub fn base_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}_tweets", normalize_handle(&self.target)))
    }

    /// Build the surface this run reads from
    fn surface(&self) -> Result<Box<dyn RenderSurface>, CliError> {
        match &self.replay {
            Some(dir) => Ok(Box::new(ReplaySurface::from_dir(dir)?)),
            None => Ok(Box::new(NitterSurface::new(self.instance.clone())?)),
        }
    }

    /// Collect, then export unless disabled
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let session = Session::new(self.target.clone(), self.filter, self.scrolls);
        session.validate().map_err(CliError::InvalidArgument)?;

        let collector = Collector::new(CheckpointStore::new(cli.checkpoint_dir.clone()))
            .with_max_retries(cli.max_retries)
            .with_max_stall(self.max_stall)
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .with_scroll_delay(Duration::from_millis(self.scroll_delay_ms))
            .with_shutdown(shutdown);

        let mut surface = self.surface()?;

        info!(
            target_account = %self.target,
            filter_mode = %self.filter,
            scrolls = self.scrolls,
            "Starting collection"
        );

        let progress = match cli.output_format {
            OutputFormat::Human => Some(create_progress_bar(&self.target)),
            OutputFormat::Json => None,
        };
        let outcome = collector
            .collect(session, surface.as_mut(), progress.as_ref())
            .await;
        if let Some(pb) = &progress {
            pb.finish_and_clear();
        }
        let outcome = outcome?;

        let export = if self.no_export {
            None
        } else {
            let merger = ExportMerger::new(self.out_dir.clone()).with_confirm(Box::new(StdinConfirm));
            Some(merger.export(&outcome.records, &self.base_name(), self.export)?)
        };

        match cli.output_format {
            OutputFormat::Json => output_json(&outcome, export.as_ref()),
            OutputFormat::Human => output_human(&self.target, &outcome, export.as_ref()),
        }
        Ok(())
    }
}

/// Create progress bar with style
fn create_progress_bar(target: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches {msg}")
            .expect("hardcoded template is valid")
            .progress_chars("#>-"),
    );
    pb.set_message(format!("@{}", normalize_handle(target)));
    pb
}

fn export_json(export: Option<&ExportOutcome>) -> serde_json::Value {
    match export {
        None => serde_json::Value::Null,
        Some(ExportOutcome::Written {
            path,
            records_written,
            new_records,
        }) => serde_json::json!({
            "result": "written",
            "path": path.display().to_string(),
            "records_written": records_written,
            "new_records": new_records,
        }),
        Some(ExportOutcome::Unchanged { path }) => serde_json::json!({
            "result": "unchanged",
            "path": path.display().to_string(),
        }),
        Some(ExportOutcome::Declined { path }) => serde_json::json!({
            "result": "declined",
            "path": path.display().to_string(),
        }),
        Some(ExportOutcome::Empty) => serde_json::json!({ "result": "empty" }),
    }
}

/// Output result as JSON
fn output_json(outcome: &CollectOutcome, export: Option<&ExportOutcome>) {
    let output = serde_json::json!({
        "status": outcome.status,
        "termination": outcome.termination,
        "records": outcome.records.len(),
        "stats": outcome.stats,
        "last_error": outcome.last_error,
        "export": export_json(export),
    });
    println!("{output}");
}

/// Output result in human-readable format
fn output_human(target: &str, outcome: &CollectOutcome, export: Option<&ExportOutcome>) {
    let stats = &outcome.stats;
    println!(
        "\nCollection {} ({}): {} posts from @{}",
        outcome.status,
        outcome.termination,
        outcome.records.len(),
        normalize_handle(target)
    );
    println!(
        "Batches: {}  New: {}  Resumed: {}  Filtered: {}  Duplicates: {}  Malformed: {}",
        stats.batches,
        stats.new_records,
        stats.resumed_records,
        stats.filtered,
        stats.duplicates,
        stats.malformed
    );
    if stats.retries > 0 {
        println!("Retries: {}", stats.retries);
    }
    if let Some(err) = &outcome.last_error {
        println!("Last error: {err}");
    }

    if !outcome.records.is_empty() {
        println!();
        for (i, record) in outcome.records.iter().take(PREVIEW_RECORDS).enumerate() {
            print_preview(i + 1, record);
        }
        if outcome.records.len() > PREVIEW_RECORDS {
            println!("... and {} more posts\n", outcome.records.len() - PREVIEW_RECORDS);
        }
    }

    match export {
        Some(ExportOutcome::Written {
            path,
            records_written,
            new_records,
        }) => println!(
            "Saved {records_written} posts ({new_records} new) to {}",
            path.display()
        ),
        Some(ExportOutcome::Unchanged { path }) => {
            println!("No new posts; {} left unchanged", path.display())
        }
        Some(ExportOutcome::Declined { path }) => {
            println!("Not overwriting {}; nothing saved", path.display())
        }
        Some(ExportOutcome::Empty) => println!("No posts to export"),
        None => {}
    }
}

fn print_preview(n: usize, record: &PostRecord) {
    let created = record
        .created_at
        .map(|at| at.format(CREATED_AT_FORMAT).to_string())
        .unwrap_or_else(|| "unknown date".to_string());
    println!("{n}. [{}] [{created}]", record.kind_label());

    let mut text: String = record.text.chars().take(PREVIEW_CHARS).collect();
    if record.text.chars().count() > PREVIEW_CHARS {
        text.push_str("...");
    }
    println!("   {}", text.replace('\n', " "));

    if !record.hashtags.is_empty() {
        println!("   Hashtags: {}", record.hashtags.iter().take(3).cloned().collect::<Vec<_>>().join(", "));
    }
    if !record.mentions.is_empty() {
        println!("   Mentions: {}", record.mentions.iter().take(3).cloned().collect::<Vec<_>>().join(", "));
    }
    println!();
}
