//! Render surfaces
//!
//! A [`RenderSurface`] is the page-like source the collector scrolls
//! through. `navigate` opens a target, `advance` loads the next batch and
//! `read_rendered_units` returns the units of the batch currently shown.
//!
//! Implementations:
//!
//! - [`NitterSurface`] - live HTTP front-end following "Load more" cursors
//! - [`ReplaySurface`] - saved page snapshots, for offline runs and tests

pub mod nitter;
pub mod replay;

pub use nitter::NitterSurface;
pub use replay::ReplaySurface;

use crate::extractor::markup;
use crate::extractor::RenderedUnit;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Surface failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// The operation did not finish in time
    #[error("surface timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Http {
        /// Status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Target missing or surface unusable
    #[error("surface unavailable: {0}")]
    Unavailable(String),

    /// Read or advance before navigate
    #[error("surface has not been navigated to a target")]
    NotNavigated,

    /// Cursor not understood by this surface
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

impl SurfaceError {
    /// Whether retrying the same operation can succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SurfaceError::Timeout(_) | SurfaceError::Network(_) => true,
            SurfaceError::Http { status, .. } => *status == 429 || *status >= 500,
            SurfaceError::Unavailable(_)
            | SurfaceError::NotNavigated
            | SurfaceError::InvalidCursor(_) => false,
        }
    }
}

/// Page-like source of rendered units
#[async_trait]
pub trait RenderSurface: Send {
    /// Open `target` and render its first batch
    async fn navigate(&mut self, target: &str) -> Result<(), SurfaceError>;

    /// Load the next batch
    async fn advance(&mut self) -> Result<(), SurfaceError>;

    /// Units of the batch currently rendered. Empty once the source is exhausted.
    async fn read_rendered_units(&mut self) -> Result<Vec<RenderedUnit>, SurfaceError>;

    /// Opaque position of the current batch, if the surface can return to it
    fn cursor(&self) -> Option<String> {
        None
    }

    /// Return to a position previously reported by [`RenderSurface::cursor`]
    async fn seek(&mut self, _cursor: &str) -> Result<(), SurfaceError> {
        Ok(())
    }
}

/// Split a timeline page into its `timeline-item` units
pub fn split_page(html: &str) -> Vec<RenderedUnit> {
    markup::find_by_class(html, "timeline-item")
        .into_iter()
        .map(|item| RenderedUnit::new(item.outer()))
        .collect()
}

/// Cursor of the page's "Load more" link, if any
pub fn next_cursor(html: &str) -> Option<String> {
    markup::find_by_class(html, "show-more")
        .into_iter()
        .flat_map(|block| markup::find_by_tag(block.outer(), "a"))
        .filter_map(|a| a.attr("href"))
        .find_map(|href| {
            let (_, query) = href.split_once('?')?;
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("cursor="))
                .filter(|cursor| !cursor.is_empty())
                .map(str::to_string)
        })
}
