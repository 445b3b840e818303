//! HTTP surface for Nitter instances
//!
//! Each batch is one timeline page. `advance` follows the page's
//! "Load more" cursor; once a page has no cursor the surface is exhausted
//! and further reads return no units.

use super::{next_cursor, split_page, RenderSurface, SurfaceError};
use crate::extractor::RenderedUnit;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

/// Default public instance
pub const DEFAULT_INSTANCE: &str = "https://nitter.net";

/// Per-request timeout applied by the HTTP client
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("timeline-harvester/", env!("CARGO_PKG_VERSION"));

/// Live front-end surface
pub struct NitterSurface {
    client: Client,
    base_url: String,
    target: Option<String>,
    page: Option<String>,
    page_cursor: Option<String>,
    next_cursor: Option<String>,
}

impl NitterSurface {
    /// Surface for the instance at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, SurfaceError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SurfaceError::Unavailable(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Surface using a caller-provided client
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            target: None,
            page: None,
            page_cursor: None,
            next_cursor: None,
        }
    }

    /// Instance base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the timeline page for `target` at `cursor`
    pub fn page_url(&self, target: &str, cursor: Option<&str>) -> String {
        match cursor {
            Some(cursor) => format!("{}/{}?cursor={}", self.base_url, target, cursor),
            None => format!("{}/{}", self.base_url, target),
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, SurfaceError> {
        debug!(url = %url, "Fetching timeline page");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SurfaceError::Timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            } else {
                SurfaceError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SurfaceError::Unavailable(format!("{url} not found")));
        }
        if !status.is_success() {
            return Err(SurfaceError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| SurfaceError::Network(e.to_string()))
    }

    async fn load(&mut self, cursor: Option<String>) -> Result<(), SurfaceError> {
        let target = self.target.clone().ok_or(SurfaceError::NotNavigated)?;
        let url = self.page_url(&target, cursor.as_deref());
        let html = self.fetch(&url).await?;

        self.next_cursor = next_cursor(&html);
        self.page_cursor = cursor;
        self.page = Some(html);
        Ok(())
    }
}

#[async_trait]
impl RenderSurface for NitterSurface {
    async fn navigate(&mut self, target: &str) -> Result<(), SurfaceError> {
        let target = target.trim().trim_start_matches('@');
        if target.is_empty() {
            return Err(SurfaceError::Unavailable("empty target".to_string()));
        }

        self.target = Some(target.to_string());
        self.load(None).await?;
        info!(instance = %self.base_url, target = %target, "Navigated to timeline");
        Ok(())
    }

    async fn advance(&mut self) -> Result<(), SurfaceError> {
        if self.target.is_none() {
            return Err(SurfaceError::NotNavigated);
        }

        match self.next_cursor.clone() {
            Some(cursor) => self.load(Some(cursor)).await,
            None => {
                debug!("No further pages");
                self.page = None;
                Ok(())
            }
        }
    }

    async fn read_rendered_units(&mut self) -> Result<Vec<RenderedUnit>, SurfaceError> {
        if self.target.is_none() {
            return Err(SurfaceError::NotNavigated);
        }
        Ok(self.page.as_deref().map(split_page).unwrap_or_default())
    }

    fn cursor(&self) -> Option<String> {
        self.page_cursor.clone()
    }

    async fn seek(&mut self, cursor: &str) -> Result<(), SurfaceError> {
        self.load(Some(cursor.to_string())).await
    }
}
