//! Slicing metrics and telemetry.
//!
//! Tracks job counts, outcomes, and durations. Counters are atomics; the
//! duration histogram sits behind a mutex.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum number of duration samples to keep in memory.
const MAX_DURATION_SAMPLES: usize = 1000;

/// Slicing metrics collector, shared between concurrent jobs.
#[derive(Debug)]
pub struct SliceMetrics {
    jobs_started: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_timed_out: AtomicU64,
    jobs_cancelled: AtomicU64,
    gcode_bytes_written: AtomicU64,
    duration_samples: Mutex<Vec<Duration>>,
}

impl SliceMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self {
            jobs_started: AtomicU64::new(0),
            jobs_succeeded: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            jobs_timed_out: AtomicU64::new(0),
            jobs_cancelled: AtomicU64::new(0),
            gcode_bytes_written: AtomicU64::new(0),
            duration_samples: Mutex::new(Vec::with_capacity(MAX_DURATION_SAMPLES)),
        }
    }

    /// Record a job start.
    pub fn record_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful job with its duration and output size.
    pub fn record_success(&self, duration: Duration, output_bytes: u64) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        self.gcode_bytes_written
            .fetch_add(output_bytes, Ordering::Relaxed);
        self.add_duration_sample(duration);
    }

    /// Record a failed job.
    pub fn record_failure(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job that hit its deadline. Also counts as a failure.
    pub fn record_timeout(&self) {
        self.jobs_timed_out.fetch_add(1, Ordering::Relaxed);
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cancelled job.
    pub fn record_cancelled(&self) {
        self.jobs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    fn add_duration_sample(&self, duration: Duration) {
        if let Ok(mut samples) = self.duration_samples.lock() {
            if samples.len() >= MAX_DURATION_SAMPLES {
                samples.remove(0);
            }
            samples.push(duration);
        }
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut durations = self
            .duration_samples
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        durations.sort();

        let percentile = |p: usize| -> Option<u64> {
            let idx = (durations.len().saturating_sub(1) * p) / 100;
            durations.get(idx).map(|d| d.as_millis() as u64)
        };

        MetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_timed_out: self.jobs_timed_out.load(Ordering::Relaxed),
            jobs_cancelled: self.jobs_cancelled.load(Ordering::Relaxed),
            gcode_bytes_written: self.gcode_bytes_written.load(Ordering::Relaxed),
            duration_p50_ms: percentile(50),
            duration_p95_ms: percentile(95),
            duration_p99_ms: percentile(99),
            sample_count: durations.len() as u64,
        }
    }
}

impl Default for SliceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of slicing metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Jobs started.
    pub jobs_started: u64,
    /// Jobs that produced output.
    pub jobs_succeeded: u64,
    /// Jobs that failed, timeouts included.
    pub jobs_failed: u64,
    /// Jobs that hit their deadline.
    pub jobs_timed_out: u64,
    /// Jobs cancelled by the caller.
    pub jobs_cancelled: u64,
    /// Total size of produced output files.
    pub gcode_bytes_written: u64,
    /// Median job duration in milliseconds.
    pub duration_p50_ms: Option<u64>,
    /// 95th percentile job duration in milliseconds.
    pub duration_p95_ms: Option<u64>,
    /// 99th percentile job duration in milliseconds.
    pub duration_p99_ms: Option<u64>,
    /// Number of duration samples collected.
    pub sample_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counting() {
        let m = SliceMetrics::new();
        m.record_started();
        m.record_started();
        m.record_success(Duration::from_secs(5), 1000);
        m.record_failure();
        m.record_cancelled();

        let snap = m.snapshot();
        assert_eq!(snap.jobs_started, 2);
        assert_eq!(snap.jobs_succeeded, 1);
        assert_eq!(snap.jobs_failed, 1);
        assert_eq!(snap.jobs_cancelled, 1);
        assert_eq!(snap.gcode_bytes_written, 1000);
    }

    #[test]
    fn test_metrics_percentiles() {
        let m = SliceMetrics::new();
        for i in 1..=100 {
            m.record_success(Duration::from_millis(i * 10), 100);
        }

        let snap = m.snapshot();
        let p50 = snap.duration_p50_ms.expect("p50");
        let p95 = snap.duration_p95_ms.expect("p95");
        let p99 = snap.duration_p99_ms.expect("p99");
        assert!(p50 < p95);
        assert!(p95 <= p99);
        assert_eq!(snap.sample_count, 100);
    }

    #[test]
    fn test_metrics_empty_percentiles() {
        let snap = SliceMetrics::new().snapshot();
        assert!(snap.duration_p50_ms.is_none());
        assert!(snap.duration_p99_ms.is_none());
    }

    #[test]
    fn test_timeout_increments_both() {
        let m = SliceMetrics::new();
        m.record_timeout();
        let snap = m.snapshot();
        assert_eq!(snap.jobs_timed_out, 1);
        assert_eq!(snap.jobs_failed, 1);
    }
}
