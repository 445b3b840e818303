//! Session parameters, stall tracking and outcome types

use crate::{FilterMode, PostRecord};
use serde::{Deserialize, Serialize};

/// What one collection run should do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Account or timeline to collect
    pub target: String,
    /// Which post types to keep
    pub filter_mode: FilterMode,
    /// Maximum number of batches, counted across resumes
    pub scroll_budget: u32,
}

impl Session {
    /// Create session parameters
    pub fn new(target: impl Into<String>, filter_mode: FilterMode, scroll_budget: u32) -> Self {
        Self {
            target: target.into(),
            filter_mode,
            scroll_budget,
        }
    }

    /// Validate session parameters
    pub fn validate(&self) -> Result<(), String> {
        let target = self.target.trim().trim_start_matches('@');
        if target.is_empty() {
            return Err("Target cannot be empty".to_string());
        }
        if target.contains(['/', '?', '#']) || target.chars().any(char::is_whitespace) {
            return Err(format!("Invalid target: {}", self.target));
        }
        if self.scroll_budget == 0 {
            return Err("Scroll budget must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Whether a session collected everything it set out to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectStatus {
    /// Budget reached or source exhausted
    Complete,
    /// Ended early; results are still returned
    Partial,
}

impl std::fmt::Display for CollectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectStatus::Complete => write!(f, "complete"),
            CollectStatus::Partial => write!(f, "partial"),
        }
    }
}

/// Why the scroll loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Scroll budget consumed
    BudgetReached,
    /// `max_stall` consecutive batches added nothing
    Exhausted,
    /// A batch could not be fetched within the retry bound
    RetriesExhausted,
    /// Shutdown was requested
    Cancelled,
}

impl Termination {
    /// Status implied by this termination
    pub fn status(&self) -> CollectStatus {
        match self {
            Termination::BudgetReached | Termination::Exhausted => CollectStatus::Complete,
            Termination::RetriesExhausted | Termination::Cancelled => CollectStatus::Partial,
        }
    }

    /// Stable name for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::BudgetReached => "budget_reached",
            Termination::Exhausted => "exhausted",
            Termination::RetriesExhausted => "retries_exhausted",
            Termination::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stall detection state.
///
/// `Advancing` while batches keep adding records, `Stalled(n)` after `n`
/// consecutive empty batches, `Exhausted` once `n` reaches the bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollState {
    /// Last batch added at least one record
    #[default]
    Advancing,
    /// Consecutive batches without a new record
    Stalled(u32),
    /// Stall bound reached
    Exhausted,
}

impl ScrollState {
    /// Next state after a batch that accepted `accepted` records
    pub fn after_batch(self, accepted: usize, max_stall: u32) -> Self {
        if accepted > 0 {
            return ScrollState::Advancing;
        }
        let stalled = match self {
            ScrollState::Advancing => 1,
            ScrollState::Stalled(n) => n + 1,
            ScrollState::Exhausted => return ScrollState::Exhausted,
        };
        if stalled >= max_stall {
            ScrollState::Exhausted
        } else {
            ScrollState::Stalled(stalled)
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectStats {
    /// Batches processed by this run
    pub batches: u32,
    /// Records accepted by this run
    pub new_records: usize,
    /// Records restored from the checkpoint
    pub resumed_records: usize,
    /// Units that could not be parsed
    pub malformed: usize,
    /// Records rejected by the filter
    pub filtered: usize,
    /// Records already emitted earlier
    pub duplicates: usize,
    /// Retried fetch attempts
    pub retries: u32,
    /// Scroll offset when the run ended
    pub scroll_offset: u32,
}

/// Result of a collection run
#[derive(Debug, Clone)]
pub struct CollectOutcome {
    /// Complete or partial
    pub status: CollectStatus,
    /// Why the loop stopped
    pub termination: Termination,
    /// Every record of the session, including those restored from the checkpoint
    pub records: Vec<PostRecord>,
    /// Run counters
    pub stats: CollectStats,
    /// Last error message when the run ended on retries
    pub last_error: Option<String>,
}

impl CollectOutcome {
    /// Whether the run ended complete
    pub fn is_complete(&self) -> bool {
        self.status == CollectStatus::Complete
    }
}
