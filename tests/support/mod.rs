//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use timeline_harvester::collector::{BackoffPolicy, Collector};
use timeline_harvester::extractor::RenderedUnit;
use timeline_harvester::resume::CheckpointStore;
use timeline_harvester::shutdown::SharedShutdown;
use timeline_harvester::surface::{RenderSurface, SurfaceError};

/// Kind of post a fixture unit renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Original,
    Retweet,
    Quote,
    Reply,
}

/// Timeline unit for post `id` in Nitter markup
pub fn unit(id: u64) -> RenderedUnit {
    unit_of(id, Kind::Original)
}

/// Timeline unit for post `id` rendered as `kind`
pub fn unit_of(id: u64, kind: Kind) -> RenderedUnit {
    let retweet = match kind {
        Kind::Retweet => r#"<div class="retweet-header"><span><div class="icon-container"><span class="icon-retweet"></span> carol retweeted</div></span></div>"#,
        _ => "",
    };
    let reply = match kind {
        Kind::Reply => r#"<div class="replying-to">Replying to <a href="/bob">@bob</a></div>"#,
        _ => "",
    };
    let quote = match kind {
        Kind::Quote => r#"<div class="quote quote-big"><a class="quote-link" href="/dave/status/1700000000000000000#m"></a><div class="quote-text">quoted text</div></div>"#,
        _ => "",
    };
    let day = id % 28 + 1;

    RenderedUnit::new(format!(
        r#"<div class="timeline-item ">{retweet}<a class="tweet-link" href="/alice/status/{id}#m"></a>
  <div class="tweet-body">
    <div class="tweet-header">
      <a class="username" href="/alice" title="@alice">@alice</a>
      <span class="tweet-date"><a href="/alice/status/{id}#m" title="Jan {day}, 2024 · 3:04 PM UTC">Jan {day}</a></span>
    </div>
    {reply}
    <div class="tweet-content media-body" dir="auto">post {id} about #rust</div>
    {quote}
    <div class="tweet-stats">
      <span class="tweet-stat"><div class="icon-container"><span class="icon-comment" title=""></span> 1</div></span>
      <span class="tweet-stat"><div class="icon-container"><span class="icon-retweet" title=""></span> 2</div></span>
      <span class="tweet-stat"><div class="icon-container"><span class="icon-heart" title=""></span> 3</div></span>
    </div>
  </div>
</div>"#
    ))
}

/// Unit without a post link; the extractor rejects it
pub fn malformed_unit() -> RenderedUnit {
    RenderedUnit::new(r#"<div class="timeline-item"><div class="tweet-content">no link here</div></div>"#)
}

/// One page with posts `ids`
pub fn page(ids: impl IntoIterator<Item = u64>) -> Vec<RenderedUnit> {
    ids.into_iter().map(unit).collect()
}

/// Collector over `dir` with no scroll delay and millisecond backoff
pub fn fast_collector(dir: &TempDir) -> Collector {
    fast_collector_over(CheckpointStore::new(dir.path()))
}

/// Same as [`fast_collector`] over an already configured store
pub fn fast_collector_over(store: CheckpointStore) -> Collector {
    Collector::new(store)
        .with_scroll_delay(Duration::ZERO)
        .with_backoff(BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(2)))
        .with_fetch_timeout(Duration::from_millis(200))
}

/// Injected behavior for one surface call
#[derive(Debug, Clone)]
pub enum Fault {
    Fail(SurfaceError),
    Hang,
}

/// Calls observed by a [`ScriptedSurface`]
#[derive(Debug, Default)]
pub struct Calls {
    pub navigate: AtomicUsize,
    pub advance: AtomicUsize,
    pub read: AtomicUsize,
    pub seek: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// In-memory surface over fixed pages with scripted failures
pub struct ScriptedSurface {
    pages: Vec<Vec<RenderedUnit>>,
    position: Option<usize>,
    seekable: bool,
    navigate_faults: VecDeque<Fault>,
    advance_faults: VecDeque<Fault>,
    read_faults: VecDeque<Fault>,
    shutdown_on_read: Option<(usize, SharedShutdown)>,
    on_read: Option<(usize, Box<dyn FnOnce() + Send>)>,
    pub calls: Arc<Calls>,
}

impl ScriptedSurface {
    pub fn new(pages: Vec<Vec<RenderedUnit>>) -> Self {
        Self {
            pages,
            position: None,
            seekable: true,
            navigate_faults: VecDeque::new(),
            advance_faults: VecDeque::new(),
            read_faults: VecDeque::new(),
            shutdown_on_read: None,
            on_read: None,
            calls: Arc::new(Calls::default()),
        }
    }

    /// Report no cursor, forcing resumes to fast-forward
    pub fn without_cursor(mut self) -> Self {
        self.seekable = false;
        self
    }

    pub fn fail_navigate(mut self, fault: Fault) -> Self {
        self.navigate_faults.push_back(fault);
        self
    }

    pub fn fail_advance(mut self, fault: Fault) -> Self {
        self.advance_faults.push_back(fault);
        self
    }

    pub fn fail_read(mut self, fault: Fault) -> Self {
        self.read_faults.push_back(fault);
        self
    }

    /// Request shutdown during the `n`-th read (1-based); the read still succeeds
    pub fn shutdown_on_read(mut self, n: usize, shutdown: SharedShutdown) -> Self {
        self.shutdown_on_read = Some((n, shutdown));
        self
    }

    /// Run `hook` during the `n`-th read (1-based), before the batch is returned
    pub fn on_read(mut self, n: usize, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_read = Some((n, Box::new(hook)));
        self
    }

    async fn inject(faults: &mut VecDeque<Fault>) -> Result<(), SurfaceError> {
        match faults.pop_front() {
            None => Ok(()),
            Some(Fault::Fail(e)) => Err(e),
            Some(Fault::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl RenderSurface for ScriptedSurface {
    async fn navigate(&mut self, _target: &str) -> Result<(), SurfaceError> {
        self.calls.navigate.fetch_add(1, Ordering::SeqCst);
        Self::inject(&mut self.navigate_faults).await?;
        self.position = Some(0);
        Ok(())
    }

    async fn advance(&mut self) -> Result<(), SurfaceError> {
        self.calls.advance.fetch_add(1, Ordering::SeqCst);
        let position = self.position.ok_or(SurfaceError::NotNavigated)?;
        Self::inject(&mut self.advance_faults).await?;
        self.position = Some(position + 1);
        Ok(())
    }

    async fn read_rendered_units(&mut self) -> Result<Vec<RenderedUnit>, SurfaceError> {
        let reads = self.calls.read.fetch_add(1, Ordering::SeqCst) + 1;
        let position = self.position.ok_or(SurfaceError::NotNavigated)?;
        Self::inject(&mut self.read_faults).await?;
        if let Some((n, shutdown)) = &self.shutdown_on_read {
            if reads == *n {
                shutdown.request_shutdown();
            }
        }
        if self.on_read.as_ref().is_some_and(|(n, _)| reads == *n) {
            if let Some((_, hook)) = self.on_read.take() {
                hook();
            }
        }
        Ok(self.pages.get(position).cloned().unwrap_or_default())
    }

    fn cursor(&self) -> Option<String> {
        if self.seekable {
            self.position.map(|p| p.to_string())
        } else {
            None
        }
    }

    async fn seek(&mut self, cursor: &str) -> Result<(), SurfaceError> {
        self.calls.seek.fetch_add(1, Ordering::SeqCst);
        let position = cursor
            .parse()
            .map_err(|_| SurfaceError::InvalidCursor(cursor.to_string()))?;
        self.position = Some(position);
        Ok(())
    }
}

/// Ids of `records` in emission order
pub fn ids(records: &[timeline_harvester::PostRecord]) -> Vec<String> {
    records.iter().map(|r| r.post_id.clone()).collect()
}
