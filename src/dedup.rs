//! Session-wide identity index.
//!
//! Holds the post ids already emitted by the current session, including the
//! ids restored from a checkpoint, so no post is emitted twice.

use std::collections::HashSet;

/// Set of already-emitted post ids
#[derive(Debug, Clone, Default)]
pub struct DedupIndex {
    ids: HashSet<String>,
}

impl DedupIndex {
    /// Empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `post_id` was already emitted
    pub fn seen(&self, post_id: &str) -> bool {
        self.ids.contains(post_id)
    }

    /// Record `post_id`. Returns `true` if it was not present before.
    pub fn mark(&mut self, post_id: &str) -> bool {
        if self.ids.contains(post_id) {
            return false;
        }
        self.ids.insert(post_id.to_string())
    }

    /// Number of known ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in ascending order, the layout used by checkpoints
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }
}

impl<S: Into<String>> FromIterator<S> for DedupIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}
