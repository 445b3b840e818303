//! Dataset CSV codec
//!
//! Column order is fixed:
//!
//! `tweet_id, text, created_at, lang, user_id_hashed, retweet_count,
//! like_count, comment_count, is_reply, reply_to_id, is_retweet, is_quote,
//! urls, hashtags, mentions, media`
//!
//! List columns hold JSON array text, `created_at` uses
//! [`crate::CREATED_AT_FORMAT`] and an absent value is an empty cell.
//!
//! Writes go to a temp file in the target directory, are synced, then
//! renamed into place. Reads are lenient so that datasets written by older
//! tools (`True`/`False` booleans, float counts, `nan` cells) still merge.

use super::{ExportError, ExportResult};
use crate::{MediaItem, PostRecord, CREATED_AT_FORMAT, UNKNOWN_LANG};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Default buffer size for the CSV writer (8KB)
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Column headers in file order
pub const DATASET_COLUMNS: [&str; 16] = [
    "tweet_id",
    "text",
    "created_at",
    "lang",
    "user_id_hashed",
    "retweet_count",
    "like_count",
    "comment_count",
    "is_reply",
    "reply_to_id",
    "is_retweet",
    "is_quote",
    "urls",
    "hashtags",
    "mentions",
    "media",
];

/// One written CSV row
#[derive(Debug, Serialize)]
struct DatasetRow<'a> {
    tweet_id: &'a str,
    text: &'a str,
    created_at: String,
    lang: &'a str,
    user_id_hashed: &'a str,
    retweet_count: u64,
    like_count: u64,
    comment_count: u64,
    is_reply: bool,
    reply_to_id: &'a str,
    is_retweet: bool,
    is_quote: bool,
    urls: String,
    hashtags: String,
    mentions: String,
    media: String,
}

impl<'a> DatasetRow<'a> {
    fn try_from_record(record: &'a PostRecord) -> ExportResult<Self> {
        Ok(Self {
            tweet_id: &record.post_id,
            text: &record.text,
            created_at: record
                .created_at
                .map(|at| at.format(CREATED_AT_FORMAT).to_string())
                .unwrap_or_default(),
            lang: &record.lang,
            user_id_hashed: &record.author_id_hashed,
            retweet_count: record.retweet_count,
            like_count: record.like_count,
            comment_count: record.comment_count,
            is_reply: record.is_reply,
            reply_to_id: record.reply_to_id.as_deref().unwrap_or(""),
            is_retweet: record.is_retweet,
            is_quote: record.is_quote,
            urls: json_list(&record.urls)?,
            hashtags: json_list(&record.hashtags)?,
            mentions: json_list(&record.mentions)?,
            media: json_list(&record.media)?,
        })
    }
}

/// JSON array text of a list column
fn json_list<T: Serialize>(values: &[T]) -> ExportResult<String> {
    serde_json::to_string(values).map_err(|e| ExportError::SerializationError(e.to_string()))
}

/// One read CSV row; every column optional, every cell raw text
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRow {
    tweet_id: Option<String>,
    text: Option<String>,
    created_at: Option<String>,
    lang: Option<String>,
    user_id_hashed: Option<String>,
    retweet_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
    is_reply: Option<String>,
    reply_to_id: Option<String>,
    is_retweet: Option<String>,
    is_quote: Option<String>,
    urls: Option<String>,
    hashtags: Option<String>,
    mentions: Option<String>,
    media: Option<String>,
}

impl RawRow {
    /// Record for this row, None when the row has no id
    fn into_record(self) -> Option<PostRecord> {
        let post_id = present(self.tweet_id)?;
        let reply_to_id = present(self.reply_to_id);

        Some(PostRecord {
            post_id,
            text: self.text.unwrap_or_default(),
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
            lang: present(self.lang).unwrap_or_else(|| UNKNOWN_LANG.to_string()),
            author_id_hashed: self.user_id_hashed.unwrap_or_default(),
            retweet_count: parse_count_cell(self.retweet_count.as_deref()),
            like_count: parse_count_cell(self.like_count.as_deref()),
            comment_count: parse_count_cell(self.comment_count.as_deref()),
            is_reply: parse_flag(self.is_reply.as_deref()) || reply_to_id.is_some(),
            reply_to_id,
            is_retweet: parse_flag(self.is_retweet.as_deref()),
            is_quote: parse_flag(self.is_quote.as_deref()),
            urls: parse_list(self.urls.as_deref()),
            hashtags: parse_list(self.hashtags.as_deref()),
            mentions: parse_list(self.mentions.as_deref()),
            media: parse_list::<MediaItem>(self.media.as_deref()),
        })
    }
}

/// Trimmed cell, None for empty and null markers
fn present(cell: Option<String>) -> Option<String> {
    let cell = cell?;
    let trimmed = cell.trim();
    match trimmed {
        "" | "nan" | "NaN" | "None" | "null" => None,
        _ => Some(trimmed.to_string()),
    }
}

fn parse_flag(cell: Option<&str>) -> bool {
    matches!(
        cell.map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("true" | "1" | "yes")
    )
}

fn parse_count_cell(cell: Option<&str>) -> u64 {
    let Some(cell) = cell.map(str::trim).filter(|c| !c.is_empty()) else {
        return 0;
    };
    cell.parse::<u64>()
        .ok()
        .or_else(|| {
            cell.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64)
        })
        .unwrap_or(0)
}

fn parse_list<T: for<'de> Deserialize<'de>>(cell: Option<&str>) -> Vec<T> {
    match cell.map(str::trim) {
        None | Some("") => Vec::new(),
        Some(text) => serde_json::from_str(text).unwrap_or_else(|e| {
            debug!(cell = %text, error = %e, "Unreadable list cell, using empty list");
            Vec::new()
        }),
    }
}

fn parse_timestamp(cell: &str) -> Option<DateTime<Utc>> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(cell, CREATED_AT_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(cell)
                .ok()
                .map(|at| at.with_timezone(&Utc))
        })
}

/// Write `records` to a synced temp file inside `dir`
///
/// The caller places the file with [`commit_replace`] or [`commit_new`].
pub fn stage_dataset(dir: &Path, records: &[PostRecord]) -> ExportResult<NamedTempFile> {
    std::fs::create_dir_all(dir)
        .map_err(|e| ExportError::IoError(format!("Failed to create directory: {e}")))?;

    let staged = NamedTempFile::new_in(dir)
        .map_err(|e| ExportError::IoError(format!("Failed to create temp file: {e}")))?;

    let file = staged
        .reopen()
        .map_err(|e| ExportError::IoError(format!("Failed to open temp file: {e}")))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file));

    // Header is written explicitly so an empty dataset still carries it
    writer
        .write_record(DATASET_COLUMNS)
        .map_err(|e| ExportError::CsvError(e.to_string()))?;

    for record in records {
        writer
            .serialize(DatasetRow::try_from_record(record)?)
            .map_err(|e| ExportError::CsvError(e.to_string()))?;
    }

    let mut buf_writer = writer
        .into_inner()
        .map_err(|e| ExportError::IoError(format!("Failed to get inner writer: {e}")))?;
    buf_writer
        .flush()
        .map_err(|e| ExportError::IoError(format!("Failed to flush: {e}")))?;
    let file = buf_writer
        .into_inner()
        .map_err(|e| ExportError::IoError(format!("Failed to get file handle: {e}")))?;
    file.sync_all()
        .map_err(|e| ExportError::IoError(format!("Failed to sync file: {e}")))?;

    debug!(dir = %dir.display(), rows = records.len(), "Dataset staged");
    Ok(staged)
}

/// Rename a staged dataset onto `path`, replacing any existing file
pub fn commit_replace(staged: NamedTempFile, path: &Path) -> ExportResult<()> {
    staged
        .persist(path)
        .map_err(|e| ExportError::IoError(format!("Failed to persist {}: {e}", path.display())))?;
    sync_parent(path);
    Ok(())
}

/// Result of placing a staged dataset without overwriting
#[derive(Debug)]
pub enum NewFile {
    /// The dataset now lives at the requested path
    Created,
    /// Something already exists there; the staged file is handed back
    Taken(NamedTempFile),
}

/// Rename a staged dataset onto `path` only if nothing exists there
pub fn commit_new(staged: NamedTempFile, path: &Path) -> ExportResult<NewFile> {
    match staged.persist_noclobber(path) {
        Ok(_) => {
            sync_parent(path);
            Ok(NewFile::Created)
        }
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(NewFile::Taken(e.file)),
        Err(e) => Err(ExportError::IoError(format!(
            "Failed to persist {}: {}",
            path.display(),
            e.error
        ))),
    }
}

fn sync_parent(path: &Path) {
    if let Some(dir) = path.parent() {
        if let Ok(dir) = File::open(dir) {
            let _ = dir.sync_all();
        }
    }
}

/// Read a dataset back into records
///
/// Rows without a `tweet_id` are skipped. A repeated id keeps its first row.
pub fn read_dataset(path: &Path) -> ExportResult<Vec<PostRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| ExportError::CsvError(format!("{}: {e}", path.display())))?;

    let mut seen = std::collections::HashSet::new();
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (index, row) in reader.deserialize::<RawRow>().enumerate() {
        let row = row.map_err(|e| {
            ExportError::CsvError(format!("{} row {}: {e}", path.display(), index + 1))
        })?;
        match row.into_record() {
            Some(record) if seen.insert(record.post_id.clone()) => records.push(record),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "Skipped dataset rows without id or with repeated id");
    }
    debug!(path = %path.display(), rows = records.len(), "Dataset read");
    Ok(records)
}
