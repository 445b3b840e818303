//! Offline surface replaying saved pages
//!
//! Each page is one batch. The cursor is the page index, so a resumed
//! session can seek straight back to the last consumed page.

use super::{split_page, RenderSurface, SurfaceError};
use crate::extractor::RenderedUnit;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

/// Saved pages played back in order
#[derive(Debug, Clone, Default)]
pub struct ReplaySurface {
    pages: Vec<Vec<RenderedUnit>>,
    position: Option<usize>,
}

impl ReplaySurface {
    /// Surface over already-split pages
    pub fn from_pages(pages: Vec<Vec<RenderedUnit>>) -> Self {
        Self {
            pages,
            position: None,
        }
    }

    /// Surface over every `*.html` file in `dir`, in file name order
    pub fn from_dir(dir: &Path) -> Result<Self, SurfaceError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| SurfaceError::Unavailable(format!("{}: {e}", dir.display())))?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(SurfaceError::Unavailable(format!(
                "no .html pages in {}",
                dir.display()
            )));
        }

        let pages = paths
            .iter()
            .map(|path| {
                std::fs::read_to_string(path)
                    .map(|html| split_page(&html))
                    .map_err(|e| SurfaceError::Unavailable(format!("{}: {e}", path.display())))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(dir = %dir.display(), pages = pages.len(), "Loaded replay pages");
        Ok(Self::from_pages(pages))
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[async_trait]
impl RenderSurface for ReplaySurface {
    async fn navigate(&mut self, target: &str) -> Result<(), SurfaceError> {
        debug!(target = %target, pages = self.pages.len(), "Replay navigate");
        self.position = Some(0);
        Ok(())
    }

    async fn advance(&mut self) -> Result<(), SurfaceError> {
        let position = self.position.ok_or(SurfaceError::NotNavigated)?;
        self.position = Some(position.saturating_add(1));
        Ok(())
    }

    async fn read_rendered_units(&mut self) -> Result<Vec<RenderedUnit>, SurfaceError> {
        let position = self.position.ok_or(SurfaceError::NotNavigated)?;
        Ok(self.pages.get(position).cloned().unwrap_or_default())
    }

    fn cursor(&self) -> Option<String> {
        self.position.map(|p| p.to_string())
    }

    async fn seek(&mut self, cursor: &str) -> Result<(), SurfaceError> {
        let position: usize = cursor
            .parse()
            .map_err(|_| SurfaceError::InvalidCursor(cursor.to_string()))?;
        self.position = Some(position);
        Ok(())
    }
}
