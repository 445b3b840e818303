//! CLI command implementations

pub mod checkpoints;
pub mod collect;
pub mod confirm;
pub mod error;
pub mod summarize;

pub use checkpoints::CheckpointsCommand;
pub use collect::{Cli, CollectArgs, Commands, OutputFormat};
pub use error::CliError;
pub use summarize::SummarizeArgs;
