//! Performance monitoring — per-operation timing and system counters.
//!
//! Any operation can be wrapped with [`PerformanceMonitor::measure`] (or the
//! fallible / async variants). Each call records a [`Sample`] into a ring
//! buffer keyed by operation tag; [`PerformanceMonitor::get_stats`] turns a
//! buffer into count / avg / min / max / p50 / p95 / p99.
//!
//! Design: per-tag rings live in a sharded `DashMap`, so concurrent
//! recorders only contend on the same tag. Session and request counters are
//! `AtomicU64`. Measurement never swallows failures: an `Err` or a panic
//! inside the wrapped call is recorded with `error = true` and then handed
//! back to the caller unchanged.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::MonitorConfig;
use crate::error::{EventPoolError, Result};

// ---------------------------------------------------------------------------
// Operation tags
// ---------------------------------------------------------------------------

/// Operation tags recorded by the engine.
pub mod ops {
    /// Valid-choice matching for a game state.
    pub const EVENT_CHECK: &str = "eventCheck";
    /// Criteria-based choice query.
    pub const EVENT_MATCH: &str = "eventMatch";
    /// High-impact choice listing.
    pub const HIGH_PRIORITY_EVENTS: &str = "highPriorityEvents";
    /// Single choice validation.
    pub const CHOICE_VALIDATION: &str = "choiceValidation";
    /// Batched choice validation.
    pub const BATCH_VALIDATION: &str = "batchValidation";
    /// Recommendation listing.
    pub const RECOMMENDED_CHOICES: &str = "recommendedChoices";
    /// Catalog load into the cache.
    pub const CACHE_LOAD: &str = "cacheLoad";
}

// ---------------------------------------------------------------------------
// Samples & ring buffer
// ---------------------------------------------------------------------------

/// One timed execution of an operation.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    /// Operation tag.
    pub operation: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// When the sample was recorded.
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied context; carries `"error": true` for failed calls.
    pub metadata: Option<Value>,
}

impl Sample {
    /// Whether the measured call failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("error"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Fixed-capacity FIFO of samples; the oldest is evicted once full.
#[derive(Debug)]
struct SampleRing {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    fn sorted_durations(&self) -> Vec<f64> {
        let mut durations: Vec<f64> = self.samples.iter().map(|s| s.duration_ms).collect();
        durations.sort_by(f64::total_cmp);
        durations
    }
}

/// Value at index `ceil(p/100 · n) − 1` of an ascending slice, clamped to
/// the slice bounds. Returns 0 for an empty slice.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let rank = ((p / 100.0) * n as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, n as i64 - 1) as usize;
    sorted[idx]
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Aggregate statistics for one operation tag.
#[derive(Debug, Clone, Serialize)]
pub struct OperationStats {
    /// Operation tag.
    pub operation: String,
    /// Samples currently retained.
    pub count: usize,
    /// Sum of durations.
    pub total_ms: f64,
    /// Mean duration.
    pub avg_ms: f64,
    /// Fastest sample.
    pub min_ms: f64,
    /// Slowest sample.
    pub max_ms: f64,
    /// Median.
    pub p50_ms: f64,
    /// 95th percentile.
    pub p95_ms: f64,
    /// 99th percentile.
    pub p99_ms: f64,
}

/// Process-level counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SystemMetrics {
    /// Memory reported by the installed gauge, in megabytes.
    pub memory_usage_mb: f64,
    /// Sessions currently open.
    pub active_sessions: u64,
    /// Requests per second over the current window.
    pub requests_per_second: u64,
}

/// Outcome of checking the fixed performance targets.
#[derive(Debug, Clone, Serialize)]
pub struct TargetCheck {
    /// Whether every target was met.
    pub passed: bool,
    /// One message per missed target.
    pub violations: Vec<String>,
}

/// Supplies the memory figure reported in [`SystemMetrics`], in bytes.
pub type MemoryGauge = Arc<dyn Fn() -> usize + Send + Sync>;

// ---------------------------------------------------------------------------
// Performance Monitor
// ---------------------------------------------------------------------------

/// Operation-tagged timing and system-metrics instrumentation.
pub struct PerformanceMonitor {
    config: MonitorConfig,
    buffers: DashMap<String, SampleRing>,
    active_sessions: AtomicU64,
    request_counter: AtomicU64,
    window_started: Mutex<Instant>,
    memory_gauge: RwLock<Option<MemoryGauge>>,
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("config", &self.config)
            .field("operations", &self.buffers.len())
            .field("active_sessions", &self.active_sessions.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl PerformanceMonitor {
    /// Create a monitor with the given buffer size and targets.
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            buffers: DashMap::new(),
            active_sessions: AtomicU64::new(0),
            request_counter: AtomicU64::new(0),
            window_started: Mutex::new(Instant::now()),
            memory_gauge: RwLock::new(None),
        }
    }

    /// The monitor's configuration.
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Install the memory gauge used by [`Self::get_system_metrics`].
    pub fn set_memory_gauge(&self, gauge: MemoryGauge) {
        *self.memory_gauge.write() = Some(gauge);
    }

    // ------------------------------------------------------------------
    // Measuring
    // ------------------------------------------------------------------

    /// Begin timing `operation`. The sample is recorded when the returned
    /// guard is finished or dropped.
    #[must_use = "dropping the guard right away records a near-zero sample"]
    pub fn start(&self, operation: &str) -> Measurement<'_> {
        Measurement {
            monitor: self,
            operation: operation.to_string(),
            start: Instant::now(),
            metadata: None,
            failed: false,
        }
    }

    /// Time an infallible call. A panic inside `f` is recorded as an error
    /// before unwinding continues.
    pub fn measure<T>(&self, operation: &str, metadata: Option<Value>, f: impl FnOnce() -> T) -> T {
        let mut guard = self.start(operation);
        guard.metadata = metadata;
        let out = f();
        guard.finish(None);
        out
    }

    /// Time a fallible call. `Err` results are recorded with `error = true`
    /// and returned unchanged.
    ///
    /// # Errors
    /// Whatever `f` returns.
    pub fn try_measure<T, E>(
        &self,
        operation: &str,
        metadata: Option<Value>,
        f: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let mut guard = self.start(operation);
        guard.metadata = metadata;
        let out = f();
        if out.is_err() {
            guard.mark_failed();
        }
        guard.finish(None);
        out
    }

    /// Time a fallible future. `Err` results are recorded with
    /// `error = true` and returned unchanged.
    ///
    /// # Errors
    /// Whatever `fut` resolves to.
    pub async fn measure_async<T, E, Fut>(
        &self,
        operation: &str,
        metadata: Option<Value>,
        fut: Fut,
    ) -> std::result::Result<T, E>
    where
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut guard = self.start(operation);
        guard.metadata = metadata;
        let out = fut.await;
        if out.is_err() {
            guard.mark_failed();
        }
        guard.finish(None);
        out
    }

    /// Record a sample timed elsewhere.
    pub fn record_sample(&self, operation: &str, duration_ms: f64, metadata: Option<Value>) {
        if operation == ops::EVENT_CHECK && duration_ms > self.config.event_check_p95_ms {
            warn!(
                duration_ms,
                target_ms = self.config.event_check_p95_ms,
                metadata = ?metadata,
                "Event check exceeded target"
            );
        }

        let sample = Sample {
            operation: operation.to_string(),
            duration_ms,
            timestamp: Utc::now(),
            metadata,
        };

        if let Some(mut ring) = self.buffers.get_mut(operation) {
            ring.push(sample);
            return;
        }
        self.buffers
            .entry(operation.to_string())
            .or_insert_with(|| SampleRing::new(self.config.max_samples_per_operation))
            .push(sample);
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Statistics for `operation`, or `None` if it has no samples.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn get_stats(&self, operation: &str) -> Option<OperationStats> {
        let durations = self.buffers.get(operation)?.sorted_durations();
        let count = durations.len();
        if count == 0 {
            return None;
        }
        let total_ms: f64 = durations.iter().sum();

        Some(OperationStats {
            operation: operation.to_string(),
            count,
            total_ms,
            avg_ms: total_ms / count as f64,
            min_ms: durations[0],
            max_ms: durations[count - 1],
            p50_ms: percentile(&durations, 50.0),
            p95_ms: percentile(&durations, 95.0),
            p99_ms: percentile(&durations, 99.0),
        })
    }

    /// Statistics for every operation, most frequently sampled first.
    #[must_use]
    pub fn get_all_stats(&self) -> Vec<OperationStats> {
        let operations: Vec<String> = self.buffers.iter().map(|e| e.key().clone()).collect();
        let mut stats: Vec<OperationStats> = operations
            .iter()
            .filter_map(|op| self.get_stats(op))
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.operation.cmp(&b.operation)));
        stats
    }

    /// Retained samples for `operation`, oldest first.
    #[must_use]
    pub fn get_raw_measurements(&self, operation: &str) -> Vec<Sample> {
        self.buffers
            .get(operation)
            .map(|ring| ring.samples.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every retained sample, keyed by operation.
    #[must_use]
    pub fn export_measurements(&self) -> BTreeMap<String, Vec<Sample>> {
        self.buffers
            .iter()
            .map(|e| (e.key().clone(), e.value().samples.iter().cloned().collect()))
            .collect()
    }

    /// [`Self::export_measurements`] as a JSON document.
    ///
    /// # Errors
    /// Returns `EventPoolError::Serialization` if encoding fails.
    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string(&self.export_measurements())
            .map_err(|e| EventPoolError::Serialization(e.to_string()))
    }

    /// Drop all samples and restart the request window.
    pub fn clear_measurements(&self) {
        self.buffers.clear();
        self.request_counter.store(0, Ordering::Relaxed);
        *self.window_started.lock() = Instant::now();
        info!("Performance measurements cleared");
    }

    // ------------------------------------------------------------------
    // System counters
    // ------------------------------------------------------------------

    /// A session started.
    pub fn increment_active_sessions(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// A session ended. Never goes below zero.
    pub fn decrement_active_sessions(&self) {
        // The closure always returns Some, so the update cannot fail.
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    /// Count one request towards requests/second.
    pub fn track_request(&self) {
        self.request_counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Memory, sessions and request rate. The request counter restarts once
    /// the configured window has elapsed.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn get_system_metrics(&self) -> SystemMetrics {
        let memory_bytes = self.memory_gauge.read().as_ref().map_or(0, |gauge| gauge());
        let memory_usage_mb = memory_bytes as f64 / 1024.0 / 1024.0;

        let mut window_started = self.window_started.lock();
        let elapsed_secs = window_started.elapsed().as_secs_f64();
        let requests = self.request_counter.load(Ordering::Relaxed);
        let requests_per_second = if elapsed_secs > 0.0 {
            (requests as f64 / elapsed_secs).round() as u64
        } else {
            0
        };

        if elapsed_secs >= self.config.request_window_secs as f64 {
            self.request_counter.store(0, Ordering::Relaxed);
            *window_started = Instant::now();
        }

        SystemMetrics {
            memory_usage_mb,
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            requests_per_second,
        }
    }

    // ------------------------------------------------------------------
    // Targets & reporting
    // ------------------------------------------------------------------

    /// Check `eventCheck` p95 and memory against their targets.
    #[must_use]
    pub fn check_performance_targets(&self) -> TargetCheck {
        let mut violations = Vec::new();

        if let Some(stats) = self.get_stats(ops::EVENT_CHECK) {
            if stats.p95_ms > self.config.event_check_p95_ms {
                violations.push(format!(
                    "Event check p95 ({:.3}ms) exceeds target ({}ms)",
                    stats.p95_ms, self.config.event_check_p95_ms
                ));
            }
        }

        let system = self.get_system_metrics();
        if system.memory_usage_mb > self.config.memory_limit_mb {
            violations.push(format!(
                "Memory usage ({:.2}MB) exceeds target ({}MB)",
                system.memory_usage_mb, self.config.memory_limit_mb
            ));
        }

        TargetCheck {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Human-readable dump of system metrics, target status and every
    /// operation's statistics.
    #[must_use]
    pub fn generate_report(&self) -> String {
        const RULE: &str = "═══════════════════════════════════════════════════";
        let all_stats = self.get_all_stats();
        let system = self.get_system_metrics();
        let targets = self.check_performance_targets();

        let mut report = String::new();
        let _ = writeln!(report, "{RULE}\nPerformance Monitoring Report\n{RULE}\n");

        let _ = writeln!(report, "System Metrics:");
        let _ = writeln!(report, "  Memory Usage: {:.2}MB", system.memory_usage_mb);
        let _ = writeln!(report, "  Active Sessions: {}", system.active_sessions);
        let _ = writeln!(report, "  Requests/Second: {}\n", system.requests_per_second);

        let _ = writeln!(report, "Performance Target Status:");
        if targets.passed {
            let _ = writeln!(report, "  All targets met");
        } else {
            let _ = writeln!(report, "  Target violations:");
            for violation in &targets.violations {
                let _ = writeln!(report, "     - {violation}");
            }
        }
        let _ = writeln!(report);

        let _ = writeln!(report, "Operation Statistics:");
        for stats in &all_stats {
            let _ = writeln!(report, "  {}:", stats.operation);
            let _ = writeln!(report, "    Count: {}", stats.count);
            let _ = writeln!(report, "    Avg: {:.3}ms", stats.avg_ms);
            let _ = writeln!(report, "    p50: {:.3}ms", stats.p50_ms);
            let _ = writeln!(report, "    p95: {:.3}ms", stats.p95_ms);
            let _ = writeln!(report, "    p99: {:.3}ms", stats.p99_ms);
            let _ = writeln!(report, "    Min: {:.3}ms", stats.min_ms);
            let _ = writeln!(report, "    Max: {:.3}ms\n", stats.max_ms);
        }

        let _ = writeln!(report, "{RULE}");
        report
    }

    /// Emit [`Self::generate_report`] at `info`.
    pub fn log_report(&self) {
        info!("\n{}", self.generate_report());
    }
}

// ---------------------------------------------------------------------------
// Measurement guard
// ---------------------------------------------------------------------------

/// RAII guard that records elapsed time when finished or dropped.
///
/// Dropped during a panic, the sample is flagged `error = true`.
#[must_use = "the sample is recorded when the guard is dropped"]
pub struct Measurement<'a> {
    monitor: &'a PerformanceMonitor,
    operation: String,
    start: Instant,
    metadata: Option<Value>,
    failed: bool,
}

impl Measurement<'_> {
    /// Attach context recorded with the sample.
    pub fn set_metadata(&mut self, metadata: Value) {
        self.metadata = Some(metadata);
    }

    /// Flag the sample as a failed call.
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    /// Stop the clock and record the sample, replacing the metadata when
    /// `metadata` is given.
    pub fn finish(mut self, metadata: Option<Value>) {
        if metadata.is_some() {
            self.metadata = metadata;
        }
    }
}

impl Drop for Measurement<'_> {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        let failed = self.failed || std::thread::panicking();
        let metadata = if failed {
            Some(with_error_flag(self.metadata.take()))
        } else {
            self.metadata.take()
        };
        self.monitor.record_sample(&self.operation, duration_ms, metadata);
    }
}

fn with_error_flag(metadata: Option<Value>) -> Value {
    match metadata {
        Some(Value::Object(mut map)) => {
            map.insert("error".to_string(), Value::Bool(true));
            Value::Object(map)
        }
        Some(other) => json!({ "value": other, "error": true }),
        None => json!({ "error": true }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_records_sample_with_metadata() {
        let monitor = PerformanceMonitor::default();
        let out = monitor.measure("op", Some(json!({ "turnNumber": 3 })), || 40 + 2);
        assert_eq!(out, 42);

        let samples = monitor.get_raw_measurements("op");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].operation, "op");
        assert!(samples[0].duration_ms >= 0.0);
        assert_eq!(samples[0].metadata, Some(json!({ "turnNumber": 3 })));
        assert!(!samples[0].is_error());
    }

    #[test]
    fn try_measure_records_and_returns_error() {
        let monitor = PerformanceMonitor::default();
        let out: std::result::Result<(), String> =
            monitor.try_measure("failing", Some(json!({ "id": 7 })), || Err("boom".to_string()));
        assert_eq!(out, Err("boom".to_string()));

        let samples = monitor.get_raw_measurements("failing");
        assert_eq!(samples.len(), 1);
        assert!(samples[0].is_error());
        assert_eq!(samples[0].metadata, Some(json!({ "id": 7, "error": true })));
    }

    #[test]
    fn held_guard_times_the_enclosed_work() {
        let monitor = PerformanceMonitor::default();
        let mut guard = monitor.start("manual");
        guard.set_metadata(json!({ "turnNumber": 1 }));
        std::thread::sleep(std::time::Duration::from_millis(5));
        guard.finish(None);

        let samples = monitor.get_raw_measurements("manual");
        assert_eq!(samples.len(), 1);
        assert!(samples[0].duration_ms >= 5.0);
        assert_eq!(samples[0].metadata, Some(json!({ "turnNumber": 1 })));
    }

    #[test]
    fn failed_guard_finish_replaces_metadata() {
        let monitor = PerformanceMonitor::default();
        let mut guard = monitor.start("manual");
        guard.set_metadata(json!({ "stale": true }));
        guard.mark_failed();
        guard.finish(Some(json!({ "id": 3 })));

        let samples = monitor.get_raw_measurements("manual");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].metadata, Some(json!({ "id": 3, "error": true })));
    }

    #[test]
    fn panics_are_recorded_then_resumed() {
        let monitor = PerformanceMonitor::default();
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            monitor.measure("panicky", None, || -> u32 { panic!("wrapped call failed") })
        }));
        assert!(caught.is_err());

        let samples = monitor.get_raw_measurements("panicky");
        assert_eq!(samples.len(), 1);
        assert!(samples[0].is_error());
    }

    #[tokio::test]
    async fn measure_async_records_both_outcomes() {
        let monitor = PerformanceMonitor::default();
        let ok: std::result::Result<u8, String> =
            monitor.measure_async("load", None, async { Ok(1) }).await;
        assert_eq!(ok, Ok(1));
        let err: std::result::Result<u8, String> = monitor
            .measure_async("load", None, async { Err("db down".to_string()) })
            .await;
        assert!(err.is_err());

        let samples = monitor.get_raw_measurements("load");
        assert_eq!(samples.len(), 2);
        assert!(!samples[0].is_error());
        assert!(samples[1].is_error());
    }

    #[test]
    fn stats_absent_for_unknown_operation() {
        let monitor = PerformanceMonitor::default();
        assert!(monitor.get_stats("nothing").is_none());
    }

    #[test]
    fn percentiles_over_one_to_hundred() {
        let monitor = PerformanceMonitor::default();
        for i in 1..=100 {
            monitor.record_sample("eventCheck", f64::from(i), None);
        }
        let stats = monitor.get_stats("eventCheck").expect("stats");
        assert_eq!(stats.count, 100);
        assert!((stats.p50_ms - 50.0).abs() < f64::EPSILON);
        assert!((stats.p95_ms - 95.0).abs() < f64::EPSILON);
        assert!((stats.p99_ms - 99.0).abs() < f64::EPSILON);
        assert!((stats.min_ms - 1.0).abs() < f64::EPSILON);
        assert!((stats.max_ms - 100.0).abs() < f64::EPSILON);
        assert!((stats.avg_ms - 50.5).abs() < 1e-9);
        assert!((stats.total_ms - 5050.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_clamps_small_inputs() {
        assert!((percentile(&[], 95.0)).abs() < f64::EPSILON);
        assert!((percentile(&[3.0], 1.0) - 3.0).abs() < f64::EPSILON);
        assert!((percentile(&[1.0, 2.0], 0.0) - 1.0).abs() < f64::EPSILON);
        assert!((percentile(&[1.0, 2.0], 100.0) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ring_keeps_most_recent_samples() {
        let monitor = PerformanceMonitor::default();
        for i in 1..=12_000 {
            monitor.record_sample("hot", f64::from(i), None);
        }
        let samples = monitor.get_raw_measurements("hot");
        assert_eq!(samples.len(), 10_000);
        assert!((samples[0].duration_ms - 2001.0).abs() < f64::EPSILON);
        assert!((samples[9_999].duration_ms - 12_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn all_stats_sorted_by_count() {
        let monitor = PerformanceMonitor::default();
        for _ in 0..3 {
            monitor.record_sample("rare", 1.0, None);
        }
        for _ in 0..10 {
            monitor.record_sample("common", 1.0, None);
        }
        monitor.record_sample("once", 1.0, None);

        let ops: Vec<String> = monitor
            .get_all_stats()
            .into_iter()
            .map(|s| s.operation)
            .collect();
        assert_eq!(ops, vec!["common", "rare", "once"]);
    }

    #[test]
    fn active_sessions_never_negative() {
        let monitor = PerformanceMonitor::default();
        monitor.increment_active_sessions();
        monitor.increment_active_sessions();
        assert_eq!(monitor.get_system_metrics().active_sessions, 2);

        monitor.decrement_active_sessions();
        monitor.decrement_active_sessions();
        monitor.decrement_active_sessions();
        assert_eq!(monitor.get_system_metrics().active_sessions, 0);
    }

    #[test]
    fn request_window_resets() {
        let monitor = PerformanceMonitor::new(MonitorConfig {
            request_window_secs: 0,
            ..MonitorConfig::default()
        });
        for _ in 0..10 {
            monitor.track_request();
        }
        let first = monitor.get_system_metrics();
        assert!(first.requests_per_second > 0);
        // Zero-length window: the previous read restarted the counter.
        monitor.track_request();
        assert_eq!(monitor.request_counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn memory_comes_from_gauge() {
        let monitor = PerformanceMonitor::default();
        assert!(monitor.get_system_metrics().memory_usage_mb.abs() < f64::EPSILON);
        monitor.set_memory_gauge(Arc::new(|| 2 * 1024 * 1024));
        assert!((monitor.get_system_metrics().memory_usage_mb - 2.0).abs() < 1e-9);
    }

    #[test]
    fn targets_pass_when_fast_and_small() {
        let monitor = PerformanceMonitor::default();
        for _ in 0..100 {
            monitor.record_sample(ops::EVENT_CHECK, 0.2, None);
        }
        let check = monitor.check_performance_targets();
        assert!(check.passed);
        assert!(check.violations.is_empty());
    }

    #[test]
    fn targets_fail_on_slow_event_check_and_memory() {
        let monitor = PerformanceMonitor::default();
        for _ in 0..100 {
            monitor.record_sample(ops::EVENT_CHECK, 1.5, None);
        }
        monitor.set_memory_gauge(Arc::new(|| 6 * 1024 * 1024));
        let check = monitor.check_performance_targets();
        assert!(!check.passed);
        assert_eq!(check.violations.len(), 2);
        assert!(check.violations[0].contains("Event check p95"));
        assert!(check.violations[1].contains("Memory usage"));
    }

    #[test]
    fn report_lists_operations() {
        let monitor = PerformanceMonitor::default();
        monitor.record_sample(ops::EVENT_CHECK, 0.1, None);
        monitor.record_sample(ops::EVENT_MATCH, 0.2, None);
        let report = monitor.generate_report();
        assert!(report.contains("Performance Monitoring Report"));
        assert!(report.contains("System Metrics:"));
        assert!(report.contains("All targets met"));
        assert!(report.contains("eventCheck:"));
        assert!(report.contains("eventMatch:"));
    }

    #[test]
    fn export_and_clear() {
        let monitor = PerformanceMonitor::default();
        monitor.record_sample("a", 1.0, None);
        monitor.record_sample("b", 2.0, Some(json!({ "k": "v" })));

        let exported = monitor.export_measurements();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported["b"][0].metadata, Some(json!({ "k": "v" })));

        let json: Value = serde_json::from_str(&monitor.export_json().expect("json")).expect("parse");
        assert!(json["a"].is_array());

        monitor.clear_measurements();
        assert!(monitor.get_all_stats().is_empty());
        assert!(monitor.get_raw_measurements("a").is_empty());
    }
}
