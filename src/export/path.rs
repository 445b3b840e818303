//! Dataset file naming
//!
//! Every dataset lives directly in the export directory as `{base}.csv`
//! or a suffixed variant of it:
//!
//! - timestamp: `{base}_{YYYYmmdd_HHMMSS}.csv`
//! - increment: `{base}.csv`, then `{base}_1.csv`, `{base}_2.csv`, ...

use super::{ExportError, ExportResult};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Dataset file extension
pub const DATASET_EXTENSION: &str = "csv";

/// Timestamp layout embedded in timestamped file names
pub const TIMESTAMP_LAYOUT: &str = "%Y%m%d_%H%M%S";

/// Upper bound on numeric suffixes tried before giving up
pub const MAX_SUFFIX: u32 = 10_000;

/// Builds dataset paths for one base name inside one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPath {
    dir: PathBuf,
    base: String,
}

impl DatasetPath {
    /// Path builder for `base` in `dir`
    ///
    /// The base name must be a plain file stem: non-empty, no path separators,
    /// no `..`, and without the `.csv` extension (a trailing one is stripped).
    pub fn new(dir: impl Into<PathBuf>, base: &str) -> ExportResult<Self> {
        let trimmed = base.trim();
        let base = trimmed
            .strip_suffix(".csv")
            .or_else(|| trimmed.strip_suffix(".CSV"))
            .unwrap_or(trimmed);

        if base.is_empty() {
            return Err(ExportError::InvalidBaseName(
                "Base name cannot be empty".to_string(),
            ));
        }
        if base.contains(['/', '\\']) || base == "." || base == ".." {
            return Err(ExportError::InvalidBaseName(format!(
                "Base name must be a plain file name: {base}"
            )));
        }

        Ok(Self {
            dir: dir.into(),
            base: base.to_string(),
        })
    }

    /// Export directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File stem without suffixes
    pub fn base(&self) -> &str {
        &self.base
    }

    /// `{base}.csv`
    pub fn plain(&self) -> PathBuf {
        self.dir.join(format!("{}.{DATASET_EXTENSION}", self.base))
    }

    /// `{base}_{n}.csv`
    pub fn numbered(&self, n: u32) -> PathBuf {
        self.dir
            .join(format!("{}_{n}.{DATASET_EXTENSION}", self.base))
    }

    /// `{base}_{YYYYmmdd_HHMMSS}.csv`, or `{base}_{YYYYmmdd_HHMMSS}_{n}.csv` for `n > 0`
    pub fn timestamped(&self, at: DateTime<Utc>, n: u32) -> PathBuf {
        let stamp = at.format(TIMESTAMP_LAYOUT);
        let name = if n == 0 {
            format!("{}_{stamp}.{DATASET_EXTENSION}", self.base)
        } else {
            format!("{}_{stamp}_{n}.{DATASET_EXTENSION}", self.base)
        };
        self.dir.join(name)
    }

    /// `{base}.csv` when free, otherwise the smallest unused `{base}_{n}.csv` with `n >= 1`
    pub fn next_free(&self) -> ExportResult<PathBuf> {
        let plain = self.plain();
        if !plain.exists() {
            return Ok(plain);
        }
        (1..=MAX_SUFFIX)
            .map(|n| self.numbered(n))
            .find(|path| !path.exists())
            .ok_or_else(|| {
                ExportError::NoFreeName(format!(
                    "{} and {MAX_SUFFIX} numbered variants all exist",
                    plain.display()
                ))
            })
    }
}
