//! Checkpoint data for one collection session

use super::ResumeError;
use crate::{FilterMode, PostRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Current checkpoint schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Progress marker for one (target, filter mode) session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    schema_version: String,
    target: String,
    filter_mode: FilterMode,
    scroll_offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cursor: Option<String>,
    seen_ids: Vec<String>,
    #[serde(default)]
    records: Vec<PostRecord>,
    #[serde(default)]
    metadata: CheckpointMetadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Running totals across every run of a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Batches processed
    pub total_batches: u64,
    /// Records accepted
    pub total_records: u64,
    /// Units skipped as unparseable
    pub malformed_units: u64,
    /// Runs that started from this checkpoint
    pub resumes: u32,
}

impl Checkpoint {
    /// Fresh checkpoint at offset 0
    pub fn new(target: impl Into<String>, filter_mode: FilterMode) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            target: target.into(),
            filter_mode,
            scroll_offset: 0,
            cursor: None,
            seen_ids: Vec::new(),
            records: Vec::new(),
            metadata: CheckpointMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Schema version the file was written with
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Session target
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Session filter mode
    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    /// Number of batches already consumed
    pub fn scroll_offset(&self) -> u32 {
        self.scroll_offset
    }

    /// Surface position after the last consumed batch, if the surface exposes one
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Emitted post ids, ascending
    pub fn seen_ids(&self) -> &[String] {
        &self.seen_ids
    }

    /// Records accumulated so far, in emission order
    pub fn records(&self) -> &[PostRecord] {
        &self.records
    }

    /// Consume the checkpoint, keeping its records
    pub fn into_records(self) -> Vec<PostRecord> {
        self.records
    }

    /// Running totals
    pub fn metadata(&self) -> &CheckpointMetadata {
        &self.metadata
    }

    /// Creation time of the first run
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last successful batch
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Note that a new run picked this checkpoint up
    pub fn mark_resumed(&mut self) {
        self.metadata.resumes += 1;
    }

    /// Fold one processed batch into the checkpoint.
    ///
    /// `seen_ids` replaces the stored id set; `accepted` is appended to the
    /// stored records.
    pub fn record_batch(
        &mut self,
        scroll_offset: u32,
        cursor: Option<String>,
        seen_ids: Vec<String>,
        accepted: Vec<PostRecord>,
        malformed: u64,
    ) {
        self.metadata.total_batches += 1;
        self.metadata.total_records += accepted.len() as u64;
        self.metadata.malformed_units += malformed;

        debug!(
            scroll_offset = scroll_offset,
            accepted = accepted.len(),
            malformed = malformed,
            total_records = self.metadata.total_records,
            "Recording batch in checkpoint"
        );

        self.scroll_offset = scroll_offset;
        if cursor.is_some() {
            self.cursor = cursor;
        }
        self.seen_ids = seen_ids;
        self.records.extend(accepted);
        self.updated_at = Utc::now();
    }

    /// Validate schema version (accepts current version only)
    pub fn validate_schema_version(&self) -> Result<(), ResumeError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ResumeError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION.to_string(),
                found: self.schema_version.clone(),
            });
        }
        Ok(())
    }

    /// Check internal consistency of a loaded checkpoint
    pub fn validate(&self) -> Result<(), ResumeError> {
        self.validate_schema_version()?;

        if self.target.trim().is_empty() {
            return Err(ResumeError::Corrupt("empty target".to_string()));
        }

        let seen: HashSet<&str> = self.seen_ids.iter().map(String::as_str).collect();
        let mut record_ids = HashSet::with_capacity(self.records.len());
        for record in &self.records {
            if !record_ids.insert(record.post_id.as_str()) {
                return Err(ResumeError::Corrupt(format!(
                    "duplicate record {}",
                    record.post_id
                )));
            }
            if !seen.contains(record.post_id.as_str()) {
                return Err(ResumeError::Corrupt(format!(
                    "record {} missing from seen ids",
                    record.post_id
                )));
            }
            record.validate().map_err(ResumeError::Corrupt)?;
        }

        Ok(())
    }
}
