//! Fetcher metrics collection and reporting
//!
//! Tracks attempt latency percentiles, success rate, and how often the cache
//! and request coalescing spared a network round trip.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Snapshot of a fetcher's metrics
#[derive(Debug, Clone, PartialEq)]
pub struct FetchMetrics {
    /// Name of the upstream API
    pub upstream: String,
    /// 50th percentile attempt latency in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile attempt latency in milliseconds
    pub latency_p99_ms: f64,
    /// Share of network attempts that returned 2xx (0.0 to 1.0)
    pub success_rate: f64,
    /// Network attempts issued
    pub network_attempts: u64,
    /// Network attempts that did not return 2xx
    pub failed_attempts: u64,
    /// Calls answered from the cache
    pub cache_hits: u64,
    /// Calls that attached to an in-flight request
    pub coalesced: u64,
    /// 429 responses that were retried after a backoff
    pub throttled_retries: u64,
}

impl FetchMetrics {
    /// Creates metrics with no data
    pub fn empty(upstream: &str) -> Self {
        Self {
            upstream: upstream.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            network_attempts: 0,
            failed_attempts: 0,
            cache_hits: 0,
            coalesced: 0,
            throttled_retries: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

/// Collects and computes metrics for one fetcher
pub struct MetricsCollector {
    upstream: String,
    /// Rolling window of latency samples
    samples: RwLock<VecDeque<LatencySample>>,
    network_attempts: AtomicU64,
    failed_attempts: AtomicU64,
    cache_hits: AtomicU64,
    coalesced: AtomicU64,
    throttled_retries: AtomicU64,
}

impl MetricsCollector {
    /// Creates a new metrics collector
    pub fn new(upstream: &str) -> Self {
        Self {
            upstream: upstream.to_string(),
            samples: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
            network_attempts: AtomicU64::new(0),
            failed_attempts: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            throttled_retries: AtomicU64::new(0),
        }
    }

    /// Records one network attempt with its duration and outcome
    pub async fn record_attempt(&self, duration: Duration, success: bool) {
        self.network_attempts.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_attempts.fetch_add(1, Ordering::Relaxed);
        }

        let mut samples = self.samples.write().await;
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_throttled_retry(&self) {
        self.throttled_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Computes current metrics from collected samples
    pub async fn snapshot(&self) -> FetchMetrics {
        let samples = self.samples.read().await;
        let attempts = self.network_attempts.load(Ordering::Relaxed);
        let failed = self.failed_attempts.load(Ordering::Relaxed);

        let mut metrics = FetchMetrics::empty(&self.upstream);
        metrics.network_attempts = attempts;
        metrics.failed_attempts = failed;
        metrics.cache_hits = self.cache_hits.load(Ordering::Relaxed);
        metrics.coalesced = self.coalesced.load(Ordering::Relaxed);
        metrics.throttled_retries = self.throttled_retries.load(Ordering::Relaxed);

        if samples.is_empty() {
            return metrics;
        }

        // Percentiles over successful attempts only
        let mut latencies: Vec<f64> = samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();

        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        metrics.latency_p50_ms = percentile(&latencies, 50.0);
        metrics.latency_p99_ms = percentile(&latencies, 99.0);
        if attempts > 0 {
            metrics.success_rate = (attempts - failed) as f64 / attempts as f64;
        }

        metrics
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
