//! Checkpoint maintenance subcommand

use super::{Cli, CliError, OutputFormat};
use crate::resume::{CheckpointEntry, CheckpointStore, SessionKey};
use crate::FilterMode;
use clap::{Parser, Subcommand};

/// Inspect, verify or clear saved sessions
#[derive(Parser, Debug)]
pub struct CheckpointsCommand {
    /// Action to run
    #[command(subcommand)]
    pub action: CheckpointsAction,
}

/// Checkpoint actions
#[derive(Subcommand, Debug)]
pub enum CheckpointsAction {
    /// List saved sessions
    List,
    /// Fail if any checkpoint file cannot be loaded
    Verify,
    /// Delete one session's checkpoint, or all of them
    Clear {
        /// Account whose checkpoint to delete
        #[arg(long, required_unless_present = "all")]
        target: Option<String>,

        /// Filter mode of the session to delete
        #[arg(long, default_value = "original")]
        filter: FilterMode,

        /// Delete every checkpoint in the directory
        #[arg(long, default_value_t = false, conflicts_with = "target")]
        all: bool,
    },
}

impl CheckpointsCommand {
    /// Execute the checkpoints command
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let store = CheckpointStore::new(cli.checkpoint_dir.clone());
        match &self.action {
            CheckpointsAction::List => {
                let entries = store.list()?;
                print_entries(&entries, cli.output_format);
                Ok(())
            }
            CheckpointsAction::Verify => verify(&store, cli.output_format),
            CheckpointsAction::Clear {
                target,
                filter,
                all,
            } => clear(&store, target.as_deref(), *filter, *all, cli.output_format),
        }
    }
}

fn entry_json(entry: &CheckpointEntry) -> serde_json::Value {
    match &entry.checkpoint {
        Ok(checkpoint) => serde_json::json!({
            "path": entry.path.display().to_string(),
            "valid": true,
            "target": checkpoint.target(),
            "filter_mode": checkpoint.filter_mode(),
            "scroll_offset": checkpoint.scroll_offset(),
            "records": checkpoint.records().len(),
            "seen_ids": checkpoint.seen_ids().len(),
            "resumes": checkpoint.metadata().resumes,
            "updated_at": checkpoint.updated_at().to_rfc3339(),
        }),
        Err(e) => serde_json::json!({
            "path": entry.path.display().to_string(),
            "valid": false,
            "error": e.to_string(),
        }),
    }
}

fn print_entries(entries: &[CheckpointEntry], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let list: Vec<_> = entries.iter().map(entry_json).collect();
            println!("{}", serde_json::Value::Array(list));
        }
        OutputFormat::Human => {
            if entries.is_empty() {
                println!("No checkpoints found");
                return;
            }
            println!("Found {} checkpoint(s)", entries.len());
            for entry in entries {
                match &entry.checkpoint {
                    Ok(checkpoint) => println!(
                        "  - {} [{}] offset {} | {} posts | updated {}",
                        checkpoint.target(),
                        checkpoint.filter_mode(),
                        checkpoint.scroll_offset(),
                        checkpoint.records().len(),
                        checkpoint.updated_at().format("%Y-%m-%d %H:%M:%S UTC"),
                    ),
                    Err(e) => println!("  - {} (invalid: {e})", entry.path.display()),
                }
            }
        }
    }
}

fn verify(store: &CheckpointStore, format: OutputFormat) -> Result<(), CliError> {
    let entries = store.list()?;
    print_entries(&entries, format);

    let invalid = entries.iter().filter(|e| e.checkpoint.is_err()).count();
    if invalid > 0 {
        return Err(CliError::InvalidArgument(format!(
            "Found {invalid} invalid checkpoint file(s). Use `checkpoints clear` to remove them."
        )));
    }
    if format == OutputFormat::Human {
        println!("All {} checkpoint(s) valid", entries.len());
    }
    Ok(())
}

fn clear(
    store: &CheckpointStore,
    target: Option<&str>,
    filter: FilterMode,
    all: bool,
    format: OutputFormat,
) -> Result<(), CliError> {
    let removed = match (target, all) {
        (_, true) => store.clear_all()?,
        (Some(target), false) => usize::from(store.clear(&SessionKey::new(target, filter))?),
        (None, false) => {
            return Err(CliError::InvalidArgument(
                "Pass --target or --all".to_string(),
            ))
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "removed": removed })),
        OutputFormat::Human => println!("Removed {removed} checkpoint(s)"),
    }
    Ok(())
}
