//! Checkpoint files on disk
//!
//! Writes go to a temp file in the same directory which is flushed, synced
//! and renamed over the target, followed by an fsync of the directory. A
//! sibling `.lock` file serializes writers and readers through `fd-lock`.

use super::{Checkpoint, ResumeError};
use crate::extractor::cache::normalize_handle;
use crate::FilterMode;
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Maximum allowed checkpoint size (64 MB) to prevent memory exhaustion
pub const MAX_CHECKPOINT_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Identity of a session: one checkpoint file per key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    target: String,
    filter_mode: FilterMode,
}

impl SessionKey {
    /// Key for `target` under `filter_mode`. The target is normalized like a handle.
    pub fn new(target: &str, filter_mode: FilterMode) -> Self {
        Self {
            target: normalize_handle(target),
            filter_mode,
        }
    }

    /// Normalized target
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Filter mode
    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    /// File name without extension, e.g. `alice_original`
    pub fn file_stem(&self) -> String {
        let target: String = self
            .target
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("{}_{}", target, self.filter_mode)
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.target, self.filter_mode)
    }
}

/// A checkpoint file found by [`CheckpointStore::list`]
#[derive(Debug)]
pub struct CheckpointEntry {
    /// File path
    pub path: PathBuf,
    /// Parsed checkpoint, or why it could not be read
    pub checkpoint: Result<Checkpoint, ResumeError>,
}

/// Directory of checkpoint files
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    max_file_size: u64,
}

impl CheckpointStore {
    /// Store rooted at `dir`. Nothing is created until the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_size: MAX_CHECKPOINT_FILE_SIZE,
        }
    }

    /// Size limit applied to both saves and loads
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Checkpoint path for `key`
    pub fn path_for(&self, key: &SessionKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    /// Load the checkpoint for `key`.
    ///
    /// `Ok(None)` means no prior session exists. An existing file that
    /// cannot be read, parsed or validated is an error, never a fresh start.
    pub fn load(&self, key: &SessionKey) -> Result<Option<Checkpoint>, ResumeError> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(path = %path.display(), session = %key, "No checkpoint found");
            return Ok(None);
        }

        let checkpoint = load_file(&path, self.max_file_size)?;
        let expected = SessionKey::new(checkpoint.target(), checkpoint.filter_mode());
        if &expected != key {
            return Err(ResumeError::SessionMismatch {
                expected: key.to_string(),
                found: expected.to_string(),
            });
        }

        info!(
            path = %path.display(),
            scroll_offset = checkpoint.scroll_offset(),
            records = checkpoint.records().len(),
            "Checkpoint loaded"
        );
        Ok(Some(checkpoint))
    }

    /// Atomically persist `checkpoint` under its session key
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<PathBuf, ResumeError> {
        let key = SessionKey::new(checkpoint.target(), checkpoint.filter_mode());
        let path = self.path_for(&key);

        debug!(
            path = %path.display(),
            scroll_offset = checkpoint.scroll_offset(),
            records = checkpoint.records().len(),
            "Saving checkpoint"
        );

        std::fs::create_dir_all(&self.dir).map_err(|e| ResumeError::IoError(e.to_string()))?;

        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| ResumeError::SerializationError(e.to_string()))?;
        // a file load would refuse must never replace a loadable one
        let size = json.len() as u64;
        if size > self.max_file_size {
            warn!(
                path = %path.display(),
                size = size,
                max = self.max_file_size,
                "Checkpoint too large to save"
            );
            return Err(ResumeError::StateTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        let mut lock = RwLock::new(open_lock_file(&path)?);
        let _guard = lock
            .write()
            .map_err(|e| ResumeError::LockError(format!("Failed to acquire write lock: {e}")))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| ResumeError::IoError(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| ResumeError::IoError(format!("Failed to write to temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| ResumeError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| ResumeError::IoError(format!("Failed to sync temp file: {e}")))?;
        temp_file
            .persist(&path)
            .map_err(|e| ResumeError::IoError(format!("Failed to persist temp file: {e}")))?;

        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }

        debug!(path = %path.display(), "Checkpoint saved");
        Ok(path)
    }

    /// Every `*.json` file in the directory, parsed where possible
    pub fn list(&self) -> Result<Vec<CheckpointEntry>, ResumeError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .map_err(|e| ResumeError::IoError(e.to_string()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
            .collect();
        paths.sort();

        Ok(paths
            .into_iter()
            .map(|path| {
                let checkpoint = load_file(&path, self.max_file_size);
                if let Err(e) = &checkpoint {
                    warn!(path = %path.display(), error = %e, "Unreadable checkpoint");
                }
                CheckpointEntry { path, checkpoint }
            })
            .collect())
    }

    /// Delete the checkpoint for `key`. Returns whether a file was removed.
    pub fn clear(&self, key: &SessionKey) -> Result<bool, ResumeError> {
        let path = self.path_for(key);
        let removed = remove_with_lock(&path)?;
        if removed {
            info!(path = %path.display(), session = %key, "Checkpoint cleared");
        }
        Ok(removed)
    }

    /// Delete every checkpoint file. Returns how many were removed.
    pub fn clear_all(&self) -> Result<usize, ResumeError> {
        let mut removed = 0;
        for entry in self.list()? {
            if remove_with_lock(&entry.path)? {
                removed += 1;
            }
        }
        info!(dir = %self.dir.display(), removed = removed, "Checkpoints cleared");
        Ok(removed)
    }
}

fn open_lock_file(path: &Path) -> Result<File, ResumeError> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path.with_extension("lock"))
        .map_err(|e| ResumeError::LockError(format!("Failed to create lock file: {e}")))
}

fn load_file(path: &Path, max_file_size: u64) -> Result<Checkpoint, ResumeError> {
    let lock = RwLock::new(open_lock_file(path)?);
    let _guard = lock
        .read()
        .map_err(|e| ResumeError::LockError(format!("Failed to acquire read lock: {e}")))?;

    let metadata = std::fs::metadata(path).map_err(|e| ResumeError::IoError(e.to_string()))?;
    if metadata.len() > max_file_size {
        return Err(ResumeError::StateTooLarge {
            size: metadata.len(),
            max: max_file_size,
        });
    }

    let contents =
        std::fs::read_to_string(path).map_err(|e| ResumeError::IoError(e.to_string()))?;
    let checkpoint: Checkpoint = serde_json::from_str(&contents).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Failed to deserialize checkpoint");
        ResumeError::DeserializationError(e.to_string())
    })?;

    checkpoint.validate()?;
    Ok(checkpoint)
}

fn remove_with_lock(path: &Path) -> Result<bool, ResumeError> {
    if !path.exists() {
        return Ok(false);
    }

    // The lock file is left in place so every writer locks the same inode.
    let mut lock = RwLock::new(open_lock_file(path)?);
    let _guard = lock
        .write()
        .map_err(|e| ResumeError::LockError(format!("Failed to acquire write lock: {e}")))?;
    std::fs::remove_file(path).map_err(|e| ResumeError::IoError(e.to_string()))?;
    Ok(true)
}
