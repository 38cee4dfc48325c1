use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sliding window of notification handling times
#[derive(Debug, Clone)]
pub struct PercentileTracker {
    samples: Arc<Mutex<VecDeque<u64>>>,
    window_size: usize,
}

impl PercentileTracker {
    /// Create a tracker that keeps the last `window_size` samples
    pub fn new(window_size: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(window_size))),
            window_size,
        }
    }

    /// Record one handling time
    pub fn record(&self, elapsed: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.window_size {
            samples.pop_front();
        }
        samples.push_back(elapsed.as_nanos().min(u64::MAX as u128) as u64);
    }

    /// Percentile `p` (0.0..=1.0) in microseconds, 0.0 with no samples
    pub fn percentile_us(&self, p: f64) -> f64 {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<_> = samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = ((sorted.len() as f64 * p).ceil() as usize)
            .saturating_sub(1)
            .min(sorted.len() - 1);
        sorted[idx] as f64 / 1000.0
    }

    /// Number of samples currently in the window
    pub fn count(&self) -> usize {
        self.samples.lock().len()
    }
}

/// Per-stage counters, shared between the stage and whoever inspects it
#[derive(Debug, Clone)]
pub struct StageMetrics {
    name: Arc<str>,
    /// Notifications handled, including the end-of-stream one
    chunks: Arc<AtomicU64>,
    bytes_in: Arc<AtomicU64>,
    bytes_out: Arc<AtomicU64>,
    latency: PercentileTracker,
    start_time: Instant,
}

impl StageMetrics {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            chunks: Arc::new(AtomicU64::new(0)),
            bytes_in: Arc::new(AtomicU64::new(0)),
            bytes_out: Arc::new(AtomicU64::new(0)),
            latency: PercentileTracker::new(1000),
            start_time: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record one handled notification and how long it took
    pub fn record_chunk(&self, bytes_in: usize, elapsed: Duration) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(bytes_in as u64, Ordering::Relaxed);
        self.latency.record(elapsed);
    }

    /// Record bytes handed downstream (or to the external output)
    pub fn record_output(&self, bytes: usize) {
        self.bytes_out.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn total_chunks(&self) -> u64 {
        self.chunks.load(Ordering::Relaxed)
    }

    pub fn total_bytes_in(&self) -> u64 {
        self.bytes_in.load(Ordering::Relaxed)
    }

    pub fn total_bytes_out(&self) -> u64 {
        self.bytes_out.load(Ordering::Relaxed)
    }

    /// Input throughput in bytes per second since creation
    pub fn throughput_bps(&self) -> f64 {
        let secs = self.start_time.elapsed().as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.total_bytes_in() as f64 / secs
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            stage: self.name.to_string(),
            chunks: self.total_chunks(),
            bytes_in: self.total_bytes_in(),
            bytes_out: self.total_bytes_out(),
            throughput_bps: self.throughput_bps(),
            latency_p50_us: self.latency.percentile_us(0.50),
            latency_p99_us: self.latency.percentile_us(0.99),
            elapsed: self.start_time.elapsed(),
        }
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub stage: String,
    pub chunks: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub throughput_bps: f64,
    pub latency_p50_us: f64,
    pub latency_p99_us: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "{}: chunks {}, in {} B, out {} B, {:.0} B/s, P50 {:.2}µs, P99 {:.2}µs",
            self.stage,
            self.chunks,
            self.bytes_in,
            self.bytes_out,
            self.throughput_bps,
            self.latency_p50_us,
            self.latency_p99_us,
        )
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}
