//! Collector with retry, stall detection and checkpoint-based resume

use super::config::{
    BackoffPolicy, DEFAULT_MAX_STALL, FETCH_TIMEOUT_SECS, MAX_RETRIES, SCROLL_DELAY_MS,
};
use super::session::{CollectOutcome, CollectStats, ScrollState, Session, Termination};
use super::CollectError;
use crate::dedup::DedupIndex;
use crate::extractor::lang::{LanguageDetector, ScriptDetector};
use crate::extractor::{RecordExtractor, RenderedUnit};
use crate::metrics::{self, SessionMetrics};
use crate::resume::{Checkpoint, CheckpointStore, SessionKey};
use crate::shutdown::{self, SharedShutdown};
use crate::surface::{RenderSurface, SurfaceError};
use crate::{FilterMode, PostRecord};
use indicatif::ProgressBar;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Outcome of one batch fetch
enum FetchFailure {
    Cancelled,
    Failed(SurfaceError),
}

/// Records accepted from one batch
struct BatchResult {
    accepted: Vec<PostRecord>,
    malformed: usize,
}

/// Orchestrates collection sessions against a checkpoint directory
pub struct Collector {
    store: CheckpointStore,
    max_stall: u32,
    max_retries: u32,
    backoff: BackoffPolicy,
    fetch_timeout: Duration,
    scroll_delay: Duration,
    shutdown: Option<SharedShutdown>,
    detector: Arc<dyn LanguageDetector + Send + Sync>,
}

impl Collector {
    /// Collector persisting checkpoints in `store`
    pub fn new(store: CheckpointStore) -> Self {
        Self {
            store,
            max_stall: DEFAULT_MAX_STALL,
            max_retries: MAX_RETRIES,
            backoff: BackoffPolicy::default(),
            fetch_timeout: Duration::from_secs(FETCH_TIMEOUT_SECS),
            scroll_delay: Duration::from_millis(SCROLL_DELAY_MS),
            shutdown: shutdown::get_global_shutdown(),
            detector: Arc::new(ScriptDetector),
        }
    }

    /// Consecutive empty batches tolerated before the source counts as exhausted
    pub fn with_max_stall(mut self, max_stall: u32) -> Self {
        self.max_stall = max_stall.max(1);
        self
    }

    /// Set maximum number of retries per fetch
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replace the backoff curve
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Upper bound for a single navigate or fetch attempt
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Pause between batches
    pub fn with_scroll_delay(mut self, delay: Duration) -> Self {
        self.scroll_delay = delay;
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Replace the language detector used by the extractor
    pub fn with_language_detector(mut self, detector: Arc<dyn LanguageDetector + Send + Sync>) -> Self {
        self.detector = detector;
        self
    }

    /// Checkpoint store in use
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Run `session` against `surface`, resuming from its checkpoint if one exists
    pub async fn collect<S>(
        &self,
        session: Session,
        surface: &mut S,
        progress: Option<&ProgressBar>,
    ) -> Result<CollectOutcome, CollectError>
    where
        S: RenderSurface + ?Sized,
    {
        session.validate().map_err(CollectError::InvalidSession)?;
        let key = SessionKey::new(&session.target, session.filter_mode);

        let span = info_span!(
            "collect",
            target_account = %key.target(),
            filter_mode = %session.filter_mode,
            scroll_budget = session.scroll_budget
        );
        self.run(session, key, surface, progress)
            .instrument(span)
            .await
    }

    async fn run<S>(
        &self,
        session: Session,
        key: SessionKey,
        surface: &mut S,
        progress: Option<&ProgressBar>,
    ) -> Result<CollectOutcome, CollectError>
    where
        S: RenderSurface + ?Sized,
    {
        let session_metrics = SessionMetrics::start(key.target(), session.filter_mode.as_str());

        let (mut checkpoint, resumed) = match self.store.load(&key)? {
            Some(mut checkpoint) => {
                checkpoint.mark_resumed();
                info!(
                    scroll_offset = checkpoint.scroll_offset(),
                    records = checkpoint.records().len(),
                    "Resuming from checkpoint"
                );
                (checkpoint, true)
            }
            None => {
                info!("Starting fresh session");
                (Checkpoint::new(key.target(), session.filter_mode), false)
            }
        };

        let mut index: DedupIndex = checkpoint.seen_ids().iter().cloned().collect();
        for record in checkpoint.records() {
            index.mark(&record.post_id);
        }

        let mut stats = CollectStats {
            resumed_records: checkpoint.records().len(),
            scroll_offset: checkpoint.scroll_offset(),
            ..CollectStats::default()
        };

        if let Some(pb) = progress {
            pb.set_length(u64::from(session.scroll_budget));
            pb.set_position(u64::from(checkpoint.scroll_offset()));
        }

        if checkpoint.scroll_offset() >= session.scroll_budget {
            info!("Scroll budget already consumed by previous runs");
            return Ok(self.finish(checkpoint, stats, Termination::BudgetReached, None, &session_metrics));
        }
        if self.shutdown_requested() {
            return Ok(self.finish(checkpoint, stats, Termination::Cancelled, None, &session_metrics));
        }

        match self.navigate(surface, &session.target, &mut stats).await {
            Ok(()) => {}
            Err(FetchFailure::Cancelled) => {
                return Ok(self.finish(checkpoint, stats, Termination::Cancelled, None, &session_metrics));
            }
            Err(FetchFailure::Failed(e)) => {
                error!(error = %e, "Surface setup failed");
                return Err(CollectError::Setup(e));
            }
        }

        if resumed && checkpoint.scroll_offset() > 0 {
            if let Err(failure) = self.reposition(surface, &checkpoint, &mut stats).await {
                let (termination, last_error) = match failure {
                    FetchFailure::Cancelled => (Termination::Cancelled, None),
                    FetchFailure::Failed(e) => (Termination::RetriesExhausted, Some(e.to_string())),
                };
                return Ok(self.finish(checkpoint, stats, termination, last_error, &session_metrics));
            }
        }

        let mut extractor = RecordExtractor::new(key.target())
            .with_detector(Box::new(Arc::clone(&self.detector)));
        let mut state = ScrollState::Advancing;
        let mut needs_advance = checkpoint.scroll_offset() > 0;
        let mut last_error = None;

        let termination = loop {
            if checkpoint.scroll_offset() >= session.scroll_budget {
                break Termination::BudgetReached;
            }
            if self.shutdown_requested() {
                break Termination::Cancelled;
            }

            let units = match self.fetch_batch(surface, needs_advance, &mut stats).await {
                Ok(units) => units,
                Err(FetchFailure::Cancelled) => break Termination::Cancelled,
                Err(FetchFailure::Failed(e)) => {
                    warn!(error = %e, "Giving up on batch; ending session as partial");
                    last_error = Some(e.to_string());
                    break Termination::RetriesExhausted;
                }
            };
            needs_advance = true;

            let offset = checkpoint.scroll_offset() + 1;
            let batch = process_batch(&mut extractor, &mut index, session.filter_mode, &units, &mut stats);
            let accepted = batch.accepted.len();

            checkpoint.record_batch(
                offset,
                surface.cursor(),
                index.to_sorted_vec(),
                batch.accepted,
                batch.malformed as u64,
            );
            self.store.save(&checkpoint)?;
            metrics::record_checkpoint_saved();
            session_metrics.record_batch(accepted, batch.malformed);

            stats.batches += 1;
            stats.scroll_offset = offset;

            info!(
                scroll_offset = offset,
                units = units.len(),
                accepted = accepted,
                malformed = batch.malformed,
                total_records = checkpoint.records().len(),
                "Batch processed"
            );

            if let Some(pb) = progress {
                pb.set_position(u64::from(offset));
                pb.set_message(format!("{} records", checkpoint.records().len()));
            }

            state = state.after_batch(accepted, self.max_stall);
            if let ScrollState::Stalled(n) = state {
                debug!(stalled = n, max_stall = self.max_stall, "No new records in batch");
            }
            if state == ScrollState::Exhausted {
                break Termination::Exhausted;
            }

            if offset < session.scroll_budget && !self.sleep(self.scroll_delay).await {
                break Termination::Cancelled;
            }
        };

        Ok(self.finish(checkpoint, stats, termination, last_error, &session_metrics))
    }

    /// Navigate with timeout and bounded retry
    async fn navigate<S>(
        &self,
        surface: &mut S,
        target: &str,
        stats: &mut CollectStats,
    ) -> Result<(), FetchFailure>
    where
        S: RenderSurface + ?Sized,
    {
        let mut retry = 0;
        loop {
            match self.timed(surface.navigate(target)).await {
                Ok(()) => return Ok(()),
                Err(e) => self.retry_with_backoff("navigate", e, &mut retry, stats).await?,
            }
        }
    }

    /// Bring a freshly navigated surface back to the last consumed batch.
    ///
    /// Seeks to the saved cursor when there is one; otherwise, or if the seek
    /// fails, advances past the batches already consumed.
    async fn reposition<S>(
        &self,
        surface: &mut S,
        checkpoint: &Checkpoint,
        stats: &mut CollectStats,
    ) -> Result<(), FetchFailure>
    where
        S: RenderSurface + ?Sized,
    {
        if let Some(cursor) = checkpoint.cursor() {
            match self.timed(surface.seek(cursor)).await {
                Ok(()) => {
                    debug!(cursor = %cursor, "Seeked to saved cursor");
                    return Ok(());
                }
                Err(e) => warn!(error = %e, "Could not seek to saved cursor; replaying batches"),
            }
        }

        let skip = checkpoint.scroll_offset().saturating_sub(1);
        info!(batches = skip, "Fast-forwarding past consumed batches");
        for _ in 0..skip {
            if self.shutdown_requested() {
                return Err(FetchFailure::Cancelled);
            }
            let mut retry = 0;
            loop {
                match self.timed(surface.advance()).await {
                    Ok(()) => break,
                    Err(e) => self.retry_with_backoff("advance", e, &mut retry, stats).await?,
                }
            }
        }
        Ok(())
    }

    /// Fetch the next batch. The surface advances at most once per batch, even across retries.
    async fn fetch_batch<S>(
        &self,
        surface: &mut S,
        needs_advance: bool,
        stats: &mut CollectStats,
    ) -> Result<Vec<RenderedUnit>, FetchFailure>
    where
        S: RenderSurface + ?Sized,
    {
        let mut advanced = !needs_advance;
        let mut retry = 0;
        loop {
            if !advanced {
                match self.timed(surface.advance()).await {
                    Ok(()) => advanced = true,
                    Err(e) => {
                        self.retry_with_backoff("fetch_batch", e, &mut retry, stats).await?;
                        continue;
                    }
                }
            }

            match self.timed(surface.read_rendered_units()).await {
                Ok(units) => return Ok(units),
                Err(e) => self.retry_with_backoff("fetch_batch", e, &mut retry, stats).await?,
            }
        }
    }

    /// Sleep before the next attempt, or fail when the error is permanent or retries are used up
    async fn retry_with_backoff(
        &self,
        operation: &'static str,
        error: SurfaceError,
        retry: &mut u32,
        stats: &mut CollectStats,
    ) -> Result<(), FetchFailure> {
        if !error.is_transient() {
            warn!(operation = operation, error = %error, "Permanent surface error");
            return Err(FetchFailure::Failed(error));
        }
        if *retry >= self.max_retries {
            error!(
                operation = operation,
                retry_count = *retry,
                max_retries = self.max_retries,
                error = %error,
                "Max retries exceeded"
            );
            return Err(FetchFailure::Failed(error));
        }

        let backoff = self.backoff.delay(*retry);
        *retry += 1;
        stats.retries += 1;
        warn!(
            operation = operation,
            retry_count = *retry,
            max_retries = self.max_retries,
            backoff_ms = backoff.as_millis() as u64,
            error = %error,
            "Retrying after backoff delay"
        );
        metrics::record_retry_backoff(operation, backoff, *retry);

        if self.sleep(backoff).await {
            Ok(())
        } else {
            Err(FetchFailure::Cancelled)
        }
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, SurfaceError>
    where
        F: Future<Output = Result<T, SurfaceError>>,
    {
        match tokio::time::timeout(self.fetch_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SurfaceError::Timeout(self.fetch_timeout)),
        }
    }

    async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.shutdown_requested();
        }
        shutdown::sleep_unless_shutdown(self.shutdown.as_ref(), duration).await
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }

    fn finish(
        &self,
        checkpoint: Checkpoint,
        mut stats: CollectStats,
        termination: Termination,
        last_error: Option<String>,
        session_metrics: &SessionMetrics,
    ) -> CollectOutcome {
        let status = termination.status();
        stats.scroll_offset = checkpoint.scroll_offset();
        let records = checkpoint.into_records();

        session_metrics.record_finished(&status.to_string(), termination.as_str(), records.len());
        if termination == Termination::Cancelled {
            info!("Shutdown requested - progress is saved in the checkpoint");
        }

        CollectOutcome {
            status,
            termination,
            records,
            stats,
            last_error,
        }
    }
}

/// Extract, filter and dedup one batch of units
fn process_batch(
    extractor: &mut RecordExtractor,
    index: &mut DedupIndex,
    filter_mode: FilterMode,
    units: &[RenderedUnit],
    stats: &mut CollectStats,
) -> BatchResult {
    let mut result = BatchResult {
        accepted: Vec::new(),
        malformed: 0,
    };

    for unit in units {
        let record = match extractor.extract(unit) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "Skipping malformed unit");
                result.malformed += 1;
                continue;
            }
        };

        if !filter_mode.accepts(&record) {
            stats.filtered += 1;
            continue;
        }
        if !index.mark(&record.post_id) {
            stats.duplicates += 1;
            continue;
        }
        result.accepted.push(record);
    }

    stats.malformed += result.malformed;
    stats.new_records += result.accepted.len();
    result
}
