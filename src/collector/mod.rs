//! Scroll-driven collection
//!
//! The collector drives a [`crate::surface::RenderSurface`] batch by batch
//! and turns what it renders into a deduplicated, filtered record set.
//!
//! # Overview
//!
//! 1. **Resume**: load the session checkpoint, seed the dedup index and records
//! 2. **Setup**: navigate the surface (retried; failure is fatal before any batch)
//! 3. **Scroll loop**: fetch a batch, extract, filter, dedup, append
//! 4. **Checkpoint**: persist after every batch, before the next one starts
//! 5. **Stop**: budget reached, stall bound reached, retries exhausted or cancelled
//!
//! # Quick Start
//!
//! ```no_run
//! use timeline_harvester::collector::{Collector, Session};
//! use timeline_harvester::resume::CheckpointStore;
//! use timeline_harvester::surface::ReplaySurface;
//! use timeline_harvester::FilterMode;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let collector = Collector::new(CheckpointStore::new(".checkpoints")).with_max_stall(2);
//! let mut surface = ReplaySurface::from_dir(std::path::Path::new("./pages"))?;
//! let outcome = collector
//!     .collect(Session::new("alice", FilterMode::All, 20), &mut surface, None)
//!     .await?;
//! println!("{} records ({})", outcome.records.len(), outcome.status);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - Transient fetch failures are retried with backoff; exceeding the bound
//!   ends the session `partial` with everything collected so far
//! - Malformed units are skipped and counted
//! - Checkpoint I/O failures abort the session with [`CollectError::Checkpoint`]
//! - Surface setup failures abort with [`CollectError::Setup`] before any batch

pub mod config;
pub mod executor;
pub mod session;

pub use config::BackoffPolicy;
pub use executor::Collector;
pub use session::{CollectOutcome, CollectStats, CollectStatus, ScrollState, Session, Termination};

use crate::resume::ResumeError;
use crate::surface::SurfaceError;

/// Collection errors
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// Session parameters rejected
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// Surface could not be opened
    #[error("surface setup failed: {0}")]
    Setup(SurfaceError),

    /// Checkpoint could not be read or written
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] ResumeError),
}
