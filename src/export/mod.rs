//! Dataset export
//!
//! The [`ExportMerger`] writes a finished record set to a CSV dataset under
//! one of four conflict policies ([`ExportMode`]):
//!
//! | Mode | Target | Existing file |
//! |------|--------|---------------|
//! | `timestamp` | `{base}_{YYYYmmdd_HHMMSS}.csv` | never touched |
//! | `increment` | `{base}.csv` or smallest free `{base}_{n}.csv` | never touched |
//! | `merge` | `{base}.csv` | unioned by `post_id`, existing rows win |
//! | `ask` | `{base}.csv` | overwritten only after [`Confirm`] agrees |
//!
//! Output is always sorted newest first (`created_at` descending, then
//! `post_id` descending) and never contains two rows with the same id.

pub mod csv;
pub mod path;

pub use self::csv::{read_dataset, DATASET_COLUMNS};
pub use path::DatasetPath;

use crate::PostRecord;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// CSV encoding or decoding error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// List column could not be encoded
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Base name is not a plain file name
    #[error("invalid base name: {0}")]
    InvalidBaseName(String),

    /// Every candidate file name is taken
    #[error("no free file name: {0}")]
    NoFreeName(String),
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Conflict policy for an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExportMode {
    /// New file with a generation timestamp in its name
    #[default]
    Timestamp,
    /// Same name with the smallest unused numeric suffix
    Increment,
    /// Union with the existing dataset
    Merge,
    /// Overwrite the existing dataset after confirmation
    Ask,
}

impl ExportMode {
    /// Stable name used by the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportMode::Timestamp => "timestamp",
            ExportMode::Increment => "increment",
            ExportMode::Merge => "merge",
            ExportMode::Ask => "ask",
        }
    }
}

impl std::fmt::Display for ExportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "timestamp" => Ok(ExportMode::Timestamp),
            "increment" => Ok(ExportMode::Increment),
            "merge" => Ok(ExportMode::Merge),
            "ask" => Ok(ExportMode::Ask),
            _ => Err(format!(
                "Invalid export mode: {s}. Valid options: timestamp, increment, merge, ask"
            )),
        }
    }
}

/// What an export did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// A dataset file was written
    Written {
        /// Final file path
        path: PathBuf,
        /// Rows in the file
        records_written: usize,
        /// Rows not present in the file before
        new_records: usize,
    },
    /// `merge` found nothing new; the file was left as is
    Unchanged {
        /// Existing file path
        path: PathBuf,
    },
    /// `ask` was not confirmed; nothing was written
    Declined {
        /// File that would have been overwritten
        path: PathBuf,
    },
    /// No records to export
    Empty,
}

impl ExportOutcome {
    /// Path of the dataset involved, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            ExportOutcome::Written { path, .. }
            | ExportOutcome::Unchanged { path }
            | ExportOutcome::Declined { path } => Some(path),
            ExportOutcome::Empty => None,
        }
    }
}

/// Overwrite confirmation capability used by [`ExportMode::Ask`]
pub trait Confirm: Send + Sync {
    /// Whether the operator agrees to `prompt`
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Confirmation that always declines
#[derive(Debug, Clone, Copy, Default)]
pub struct Decline;

impl Confirm for Decline {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Writes record sets to dataset files
pub struct ExportMerger {
    dir: PathBuf,
    confirm: Box<dyn Confirm>,
}

impl std::fmt::Debug for ExportMerger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportMerger").field("dir", &self.dir).finish()
    }
}

impl ExportMerger {
    /// Merger writing into `dir`; `ask` declines until a confirmation is injected
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            confirm: Box::new(Decline),
        }
    }

    /// Inject the confirmation used by [`ExportMode::Ask`]
    pub fn with_confirm(mut self, confirm: Box<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    /// Export directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `records` as dataset `base_name` under `mode`
    pub fn export(
        &self,
        records: &[PostRecord],
        base_name: &str,
        mode: ExportMode,
    ) -> ExportResult<ExportOutcome> {
        let paths = DatasetPath::new(&self.dir, base_name)?;
        let records = unique_newest_first(records.to_vec());

        if records.is_empty() && mode != ExportMode::Merge {
            info!(base = %paths.base(), mode = %mode, "Nothing to export");
            return Ok(ExportOutcome::Empty);
        }

        let outcome = match mode {
            ExportMode::Timestamp => self.write_timestamped(&paths, &records)?,
            ExportMode::Increment => self.write_incremented(&paths, &records)?,
            ExportMode::Merge => self.write_merged(&paths, records)?,
            ExportMode::Ask => self.write_confirmed(&paths, &records)?,
        };

        match &outcome {
            ExportOutcome::Written {
                path,
                records_written,
                new_records,
            } => info!(
                path = %path.display(),
                mode = %mode,
                records_written,
                new_records,
                "Dataset written"
            ),
            ExportOutcome::Unchanged { path } => {
                info!(path = %path.display(), "Dataset already up to date")
            }
            ExportOutcome::Declined { path } => {
                warn!(path = %path.display(), "Overwrite declined, nothing written")
            }
            ExportOutcome::Empty => info!(base = %paths.base(), "Nothing to export"),
        }
        Ok(outcome)
    }

    fn write_timestamped(
        &self,
        paths: &DatasetPath,
        records: &[PostRecord],
    ) -> ExportResult<ExportOutcome> {
        let at = Utc::now();
        let mut staged = csv::stage_dataset(paths.dir(), records)?;

        for n in 0..=path::MAX_SUFFIX {
            let candidate = paths.timestamped(at, n);
            match csv::commit_new(staged, &candidate)? {
                csv::NewFile::Created => return Ok(written(candidate, records.len(), records.len())),
                csv::NewFile::Taken(file) => staged = file,
            }
        }
        Err(ExportError::NoFreeName(format!(
            "{} at {}",
            paths.base(),
            at.format(path::TIMESTAMP_LAYOUT)
        )))
    }

    fn write_incremented(
        &self,
        paths: &DatasetPath,
        records: &[PostRecord],
    ) -> ExportResult<ExportOutcome> {
        let mut staged = csv::stage_dataset(paths.dir(), records)?;

        // A name found free can be taken before the rename; look again
        for _ in 0..=path::MAX_SUFFIX {
            let candidate = paths.next_free()?;
            match csv::commit_new(staged, &candidate)? {
                csv::NewFile::Created => return Ok(written(candidate, records.len(), records.len())),
                csv::NewFile::Taken(file) => staged = file,
            }
        }
        Err(ExportError::NoFreeName(paths.plain().display().to_string()))
    }

    fn write_merged(
        &self,
        paths: &DatasetPath,
        records: Vec<PostRecord>,
    ) -> ExportResult<ExportOutcome> {
        let target = paths.plain();
        let existing = if target.exists() {
            read_dataset(&target)?
        } else {
            Vec::new()
        };

        let merged = merge_records(existing.clone(), records);
        let new_records = merged.len() - existing.len();

        if target.exists() && new_records == 0 {
            return Ok(ExportOutcome::Unchanged { path: target });
        }
        if merged.is_empty() {
            return Ok(ExportOutcome::Empty);
        }

        let staged = csv::stage_dataset(paths.dir(), &merged)?;
        csv::commit_replace(staged, &target)?;
        Ok(written(target, merged.len(), new_records))
    }

    fn write_confirmed(
        &self,
        paths: &DatasetPath,
        records: &[PostRecord],
    ) -> ExportResult<ExportOutcome> {
        let target = paths.plain();
        if target.exists() {
            let prompt = format!("{} already exists. Overwrite?", target.display());
            if !self.confirm.confirm(&prompt) {
                return Ok(ExportOutcome::Declined { path: target });
            }
        }

        let staged = csv::stage_dataset(paths.dir(), records)?;
        csv::commit_replace(staged, &target)?;
        Ok(written(target, records.len(), records.len()))
    }
}

fn written(path: PathBuf, records_written: usize, new_records: usize) -> ExportOutcome {
    ExportOutcome::Written {
        path,
        records_written,
        new_records,
    }
}

/// Union keyed by `post_id`; rows of `existing` win over `incoming`
pub fn merge_records(existing: Vec<PostRecord>, incoming: Vec<PostRecord>) -> Vec<PostRecord> {
    unique_newest_first(existing.into_iter().chain(incoming).collect())
}

/// First occurrence of every id, sorted newest first
fn unique_newest_first(records: Vec<PostRecord>) -> Vec<PostRecord> {
    let mut seen = HashSet::new();
    let mut unique: Vec<PostRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.post_id.clone()))
        .collect();
    sort_newest_first(&mut unique);
    unique
}

/// `created_at` descending (undated last), then `post_id` descending
pub fn sort_newest_first(records: &mut [PostRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| compare_ids(&b.post_id, &a.post_id))
    });
}

/// Numeric ids compare by value, anything else lexically
fn compare_ids(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u128>(), b.parse::<u128>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
