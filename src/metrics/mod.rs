// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Latency metrics sink for finished calls.
//!
//! The tracing core does not implement a metrics backend. It reports each
//! finished call as one `(family, labels, seconds)` observation through the
//! [`LatencyRecorder`] interface; wiring that to Prometheus, OTLP or
//! anything else is the host application's concern.
//!
//! Calls route to one of three histogram families by their
//! [`crate::call::CallType`]:
//!
//! | call type | family |
//! |-----------|--------|
//! | `Http` | `http_request_handled` |
//! | `Grpc` | `grpc_request_handled` |
//! | `Outbound` | `outbound_call_seconds` |
//!
//! Calls without a type report nothing.
//!
//! [`MemoryRecorder`] is an in-process implementation with fixed-bucket
//! histograms, suitable for tests and local introspection.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::status::StatusCategory;

/// The three latency histogram families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistogramFamily {
    HttpRequestHandled,
    GrpcRequestHandled,
    OutboundCallSeconds,
}

impl HistogramFamily {
    /// Metric name as exported to a backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HttpRequestHandled => "http_request_handled",
            Self::GrpcRequestHandled => "grpc_request_handled",
            Self::OutboundCallSeconds => "outbound_call_seconds",
        }
    }
}

/// Label set attached to every latency observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LatencyLabels {
    /// Service name, fixed at tracer init.
    pub app: String,
    /// Call name.
    pub call: String,
    /// Derived status code (`OK`, `UnknownError`, service-specific codes).
    pub statuscode: String,
    /// Coarse outcome classification.
    pub statuscategory: StatusCategory,
    /// Cost-center classification (`internal` / `external`).
    pub kind: String,
}

/// Receives latency observations for finished calls.
pub trait LatencyRecorder: Send + Sync {
    fn observe(&self, family: HistogramFamily, labels: LatencyLabels, seconds: f64);
}

static GLOBAL_RECORDER: Lazy<RwLock<Arc<dyn LatencyRecorder>>> =
    Lazy::new(|| RwLock::new(Arc::new(MemoryRecorder::new())));

/// Replace the process-global latency recorder.
pub fn set_global_recorder(recorder: Arc<dyn LatencyRecorder>) {
    *GLOBAL_RECORDER.write().unwrap() = recorder;
}

/// The process-global latency recorder.
pub fn global_recorder() -> Arc<dyn LatencyRecorder> {
    GLOBAL_RECORDER.read().unwrap().clone()
}

/// Per-series aggregate kept by [`MemoryRecorder`].
#[derive(Debug, Clone)]
pub struct SeriesMetrics {
    /// Number of observations.
    pub count: u64,

    /// Sum of observed seconds.
    pub total_seconds: f64,

    /// Smallest observation.
    pub min_seconds: f64,

    /// Largest observation.
    pub max_seconds: f64,

    /// Latency distribution.
    pub histogram: Histogram,
}

impl SeriesMetrics {
    fn new() -> Self {
        Self {
            count: 0,
            total_seconds: 0.0,
            min_seconds: f64::MAX,
            max_seconds: 0.0,
            histogram: Histogram::default(),
        }
    }

    fn record(&mut self, seconds: f64) {
        self.count += 1;
        self.total_seconds += seconds;
        self.min_seconds = self.min_seconds.min(seconds);
        self.max_seconds = self.max_seconds.max(seconds);
        self.histogram.record(seconds.max(0.0));
    }

    /// Average observed latency.
    pub fn avg_seconds(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_seconds / self.count as f64
        }
    }
}

/// In-memory latency recorder with fixed-bucket histograms.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    series: RwLock<HashMap<(HistogramFamily, LatencyLabels), SeriesMetrics>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Number of observations recorded for an exact series.
    pub fn sample_count(&self, family: HistogramFamily, labels: &LatencyLabels) -> u64 {
        self.series
            .read()
            .unwrap()
            .get(&(family, labels.clone()))
            .map(|s| s.count)
            .unwrap_or(0)
    }

    /// Total observations across all series of one family.
    pub fn family_count(&self, family: HistogramFamily) -> u64 {
        self.series
            .read()
            .unwrap()
            .iter()
            .filter(|((f, _), _)| *f == family)
            .map(|(_, s)| s.count)
            .sum()
    }

    /// All series of one family with their label sets.
    pub fn family_series(&self, family: HistogramFamily) -> Vec<(LatencyLabels, SeriesMetrics)> {
        self.series
            .read()
            .unwrap()
            .iter()
            .filter(|((f, _), _)| *f == family)
            .map(|((_, l), s)| (l.clone(), s.clone()))
            .collect()
    }

    /// Take a snapshot of all series.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            series: self.series.read().unwrap().clone(),
        }
    }

    /// Drop all recorded series.
    pub fn reset(&self) {
        self.series.write().unwrap().clear();
    }
}

impl LatencyRecorder for MemoryRecorder {
    fn observe(&self, family: HistogramFamily, labels: LatencyLabels, seconds: f64) {
        let mut series = self.series.write().unwrap();
        let metrics = series
            .entry((family, labels))
            .or_insert_with(SeriesMetrics::new);
        metrics.record(seconds);
    }
}

/// Fixed-bucket latency distribution over observed call durations.
///
/// Observations are seconds, matching what [`LatencyRecorder::observe`]
/// receives. Each bucket counts observations at or below its upper bound;
/// a trailing overflow bucket catches everything slower.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Upper bucket bounds in seconds, ascending.
    bounds: Vec<f64>,

    /// Count per bucket; the last slot is the overflow bucket.
    counts: Vec<u64>,
}

impl Histogram {
    /// A histogram with custom bucket bounds (in seconds, ascending).
    pub fn with_bounds(bounds: Vec<f64>) -> Self {
        let counts = vec![0; bounds.len() + 1];
        Self { bounds, counts }
    }

    /// Record one observation.
    pub fn record(&mut self, seconds: f64) {
        let idx = self
            .bounds
            .iter()
            .position(|&b| seconds <= b)
            .unwrap_or(self.bounds.len());
        self.counts[idx] += 1;
    }

    /// Count per bucket, overflow last.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Upper bucket bounds in seconds.
    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Approximate percentile in seconds (p50, p99, etc.).
    ///
    /// Resolves to the upper bound of the bucket containing the target
    /// observation; overflow observations report twice the last bound.
    pub fn percentile(&self, p: f64) -> f64 {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return 0.0;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                return if i < self.bounds.len() {
                    self.bounds[i]
                } else {
                    self.bounds.last().copied().unwrap_or(0.0) * 2.0
                };
            }
        }

        0.0
    }

    /// Median latency in seconds.
    pub fn p50(&self) -> f64 {
        self.percentile(50.0)
    }

    /// p99 latency in seconds.
    pub fn p99(&self) -> f64 {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 5ms up to 10s, roughly log-spaced for request latencies.
        Self::with_bounds(vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ])
    }
}

/// A snapshot of all recorded series at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Aggregates keyed by family and label set.
    pub series: HashMap<(HistogramFamily, LatencyLabels), SeriesMetrics>,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();
        report.push_str("=== Latency Report ===\n\n");

        let mut entries: Vec<_> = self.series.iter().collect();
        entries.sort_by(|a, b| {
            (a.0 .0.as_str(), &a.0 .1.call).cmp(&(b.0 .0.as_str(), &b.0 .1.call))
        });

        for ((family, labels), metrics) in entries {
            report.push_str(&format!(
                "  {}{{call={}, kind={}, statuscode={}, statuscategory={}}}: {} samples, avg {:.4}s, p99 {:.3}s\n",
                family.as_str(),
                labels.call,
                labels.kind,
                labels.statuscode,
                labels.statuscategory,
                metrics.count,
                metrics.avg_seconds(),
                metrics.histogram.p99(),
            ));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{StatusCategory, OK};

    fn labels(call: &str) -> LatencyLabels {
        LatencyLabels {
            app: "testapp".to_string(),
            call: call.to_string(),
            statuscode: OK.to_string(),
            statuscategory: StatusCategory::Ok,
            kind: "internal".to_string(),
        }
    }

    #[test]
    fn test_observe_routes_by_family() {
        let recorder = MemoryRecorder::new();
        recorder.observe(HistogramFamily::HttpRequestHandled, labels("get_user"), 0.01);

        assert_eq!(
            recorder.sample_count(HistogramFamily::HttpRequestHandled, &labels("get_user")),
            1
        );
        assert_eq!(recorder.family_count(HistogramFamily::GrpcRequestHandled), 0);
        assert_eq!(recorder.family_count(HistogramFamily::OutboundCallSeconds), 0);
    }

    #[test]
    fn test_series_aggregates() {
        let recorder = MemoryRecorder::new();
        recorder.observe(HistogramFamily::OutboundCallSeconds, labels("s3_put"), 0.1);
        recorder.observe(HistogramFamily::OutboundCallSeconds, labels("s3_put"), 0.3);

        let series = recorder.family_series(HistogramFamily::OutboundCallSeconds);
        assert_eq!(series.len(), 1);
        let (_, metrics) = &series[0];
        assert_eq!(metrics.count, 2);
        assert!((metrics.avg_seconds() - 0.2).abs() < 1e-9);
        assert!((metrics.min_seconds - 0.1).abs() < 1e-9);
        assert!((metrics.max_seconds - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_distinct_labels_distinct_series() {
        let recorder = MemoryRecorder::new();
        let mut errored = labels("get_user");
        errored.statuscode = "UnknownError".to_string();
        errored.statuscategory = StatusCategory::ServerError;

        recorder.observe(HistogramFamily::HttpRequestHandled, labels("get_user"), 0.01);
        recorder.observe(HistogramFamily::HttpRequestHandled, errored.clone(), 0.02);

        assert_eq!(
            recorder.sample_count(HistogramFamily::HttpRequestHandled, &labels("get_user")),
            1
        );
        assert_eq!(
            recorder.sample_count(HistogramFamily::HttpRequestHandled, &errored),
            1
        );
    }

    #[test]
    fn test_histogram_buckets_by_seconds() {
        let mut hist = Histogram::default();

        hist.record(0.004); // bucket 0 (<=5ms)
        hist.record(0.02); // bucket 2 (<=25ms)
        hist.record(0.3); // bucket 6 (<=500ms)
        hist.record(60.0); // overflow

        assert_eq!(hist.counts()[0], 1);
        assert_eq!(hist.counts()[2], 1);
        assert_eq!(hist.counts()[6], 1);
        assert_eq!(*hist.counts().last().unwrap(), 1);
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut hist = Histogram::default();
        for _ in 0..100 {
            hist.record(0.02);
        }

        // Every observation lands in the <=25ms bucket.
        assert!((hist.p50() - 0.025).abs() < 1e-9);
        assert!((hist.p99() - 0.025).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_overflow_percentile() {
        let mut hist = Histogram::default();
        hist.record(60.0);
        assert!((hist.p99() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_report() {
        let recorder = MemoryRecorder::new();
        recorder.observe(HistogramFamily::HttpRequestHandled, labels("get_user"), 0.01);

        let report = recorder.snapshot().format_report();
        assert!(report.contains("http_request_handled"));
        assert!(report.contains("call=get_user"));
    }

    #[test]
    fn test_reset() {
        let recorder = MemoryRecorder::new();
        recorder.observe(HistogramFamily::HttpRequestHandled, labels("x"), 0.01);
        recorder.reset();
        assert_eq!(recorder.family_count(HistogramFamily::HttpRequestHandled), 0);
    }
}
