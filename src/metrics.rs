//! Collection metrics
//!
//! Counters and histograms for scroll batches, retries, checkpoints and
//! finished sessions. Emission goes through the `metrics` facade, so every
//! call is a no-op until [`init_metrics`] installs the Prometheus exporter.
//!
//! ## Exported series
//!
//! - `scroll_batches_total` - batches read from a surface
//! - `posts_collected_total` - records accepted into a session
//! - `malformed_units_total` - units the extractor could not parse
//! - `fetch_retries_total` / `retry_backoff_duration_seconds` - retry behavior
//! - `checkpoints_saved_total` - durable checkpoint writes
//! - `sessions_finished_total` / `session_duration_seconds` - session outcomes

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

static METRICS_ADDR: OnceCell<SocketAddr> = OnceCell::new();

/// Install the Prometheus exporter and register metric descriptions.
///
/// Idempotent: a second call is a no-op that returns `Ok(())`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    if let Some(existing) = METRICS_ADDR.get() {
        debug!(addr = %existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_metrics();

    let _ = METRICS_ADDR.set(addr);
    info!("Metrics endpoint listening on {}", addr);
    Ok(())
}

/// Whether [`init_metrics`] has completed.
pub fn is_initialized() -> bool {
    METRICS_ADDR.get().is_some()
}

/// Register descriptions with whatever recorder is installed.
pub fn describe_metrics() {
    describe_counter!(
        "scroll_batches_total",
        Unit::Count,
        "Scroll batches read from the render surface"
    );
    describe_counter!(
        "posts_collected_total",
        Unit::Count,
        "Post records accepted into a session"
    );
    describe_counter!(
        "malformed_units_total",
        Unit::Count,
        "Rendered units that could not be parsed"
    );
    describe_counter!(
        "fetch_retries_total",
        Unit::Count,
        "Retried navigate or batch fetch attempts"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Backoff slept before a retry"
    );
    describe_counter!(
        "checkpoints_saved_total",
        Unit::Count,
        "Checkpoints durably written"
    );
    describe_counter!(
        "sessions_finished_total",
        Unit::Count,
        "Collection sessions that reached a terminal state"
    );
    describe_histogram!(
        "session_duration_seconds",
        Unit::Seconds,
        "Wall-clock duration of a collection session"
    );
}

/// Record one retry and the backoff slept before it.
pub fn record_retry_backoff(operation: &'static str, duration: Duration, attempt: u32) {
    counter!("fetch_retries_total", "operation" => operation).increment(1);
    histogram!("retry_backoff_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());

    debug!(
        operation = operation,
        attempt = attempt,
        backoff_ms = duration.as_millis() as u64,
        "Retry backoff recorded"
    );
}

/// Record a durable checkpoint write.
pub fn record_checkpoint_saved() {
    counter!("checkpoints_saved_total").increment(1);
}

/// Per-session metrics helper
pub struct SessionMetrics {
    target: String,
    filter_mode: String,
    start_time: Instant,
}

impl SessionMetrics {
    /// Start tracking a session
    pub fn start(target: impl Into<String>, filter_mode: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            filter_mode: filter_mode.into(),
            start_time: Instant::now(),
        }
    }

    /// Record one batch with its accepted and malformed unit counts
    pub fn record_batch(&self, accepted: usize, malformed: usize) {
        counter!("scroll_batches_total", "filter_mode" => self.filter_mode.clone()).increment(1);
        counter!("posts_collected_total", "filter_mode" => self.filter_mode.clone())
            .increment(accepted as u64);
        if malformed > 0 {
            counter!("malformed_units_total").increment(malformed as u64);
        }
    }

    /// Record the terminal state of the session
    pub fn record_finished(&self, status: &str, termination: &str, records: usize) {
        let duration = self.start_time.elapsed();

        counter!(
            "sessions_finished_total",
            "status" => status.to_string(),
            "termination" => termination.to_string(),
        )
        .increment(1);
        histogram!("session_duration_seconds").record(duration.as_secs_f64());

        info!(
            target_account = %self.target,
            status = status,
            termination = termination,
            records = records,
            duration_secs = duration.as_secs(),
            "Session finished"
        );
    }
}
