//! Session-scoped memoization for author hashing and language detection.
//!
//! A [`SessionCache`] is owned by one extractor for the lifetime of one
//! session. It never evicts; it is dropped with the session.

use super::lang::LanguageDetector;
use crate::{AUTHOR_HASH_LEN, UNKNOWN_LANG};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Normalize a handle and hash it to [`AUTHOR_HASH_LEN`] lowercase hex chars.
///
/// Normalization trims whitespace, strips a leading `@` and lowercases, so
/// `@Alice` and `alice` hash identically.
pub fn hash_author(handle: &str) -> String {
    let normalized = normalize_handle(handle);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(AUTHOR_HASH_LEN);
    hex
}

/// Canonical form of an account handle
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

/// Memoized author hashes and language tags
#[derive(Debug, Default)]
pub struct SessionCache {
    authors: HashMap<String, String>,
    languages: HashMap<String, String>,
    hits: u64,
    misses: u64,
}

impl SessionCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash of `handle`, computed once per distinct normalized handle
    pub fn author_hash(&mut self, handle: &str) -> String {
        let key = normalize_handle(handle);
        if let Some(hash) = self.authors.get(&key) {
            self.hits += 1;
            return hash.clone();
        }
        self.misses += 1;
        let hash = hash_author(&key);
        self.authors.insert(key, hash.clone());
        hash
    }

    /// Language of `text` according to `detector`, computed once per distinct text
    pub fn language(&mut self, text: &str, detector: &dyn LanguageDetector) -> String {
        if let Some(lang) = self.languages.get(text) {
            self.hits += 1;
            return lang.clone();
        }
        self.misses += 1;
        let lang = detector
            .detect(text)
            .unwrap_or_else(|| UNKNOWN_LANG.to_string());
        self.languages.insert(text.to_string(), lang.clone());
        lang
    }

    /// `(hits, misses)` across both tables
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
