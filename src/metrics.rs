//! Sample collection and latency/throughput statistics
//!
//! One [`Collector`] per (driver, size, threads) configuration. Workers push
//! samples concurrently; [`Collector::calculate`] reduces them once the load
//! has drained.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::BYTES_PER_MIB;
use crate::serde_helpers::duration_micros;

/// One timed GET. Errored reads carry zero timings and bytes.
#[derive(Debug, Clone)]
pub struct Sample {
    pub ttfb: Duration,
    pub ttlb: Duration,
    pub bytes: u64,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl Sample {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Latency distribution of the successful samples of one configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyStats {
    #[serde(rename = "avg_us", with = "duration_micros")]
    pub avg: Duration,
    #[serde(rename = "min_us", with = "duration_micros")]
    pub min: Duration,
    #[serde(rename = "max_us", with = "duration_micros")]
    pub max: Duration,
    #[serde(rename = "p25_us", with = "duration_micros")]
    pub p25: Duration,
    #[serde(rename = "p50_us", with = "duration_micros")]
    pub p50: Duration,
    #[serde(rename = "p75_us", with = "duration_micros")]
    pub p75: Duration,
    #[serde(rename = "p90_us", with = "duration_micros")]
    pub p90: Duration,
    #[serde(rename = "p99_us", with = "duration_micros")]
    pub p99: Duration,
}

impl LatencyStats {
    /// Build from an already sorted slice. Empty input gives all zeros.
    pub fn from_sorted(sorted: &[Duration]) -> Self {
        let n = sorted.len();
        if n == 0 {
            return Self::default();
        }
        let total: u128 = sorted.iter().map(|d| d.as_nanos()).sum();
        let avg = Duration::from_nanos((total / n as u128) as u64);

        Self {
            avg,
            min: sorted[0],
            max: sorted[n - 1],
            p25: percentile(sorted, 0.25),
            p50: percentile(sorted, 0.50),
            p75: percentile(sorted, 0.75),
            p90: percentile(sorted, 0.90),
            p99: percentile(sorted, 0.99),
        }
    }
}

/// Nearest-rank percentile without interpolation: the element at index
/// `floor((n - 1) * q)` of the sorted slice.
pub fn percentile(sorted: &[Duration], q: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() - 1) as f64 * q).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Output of [`Collector::calculate`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollectorSummary {
    pub ttfb: LatencyStats,
    pub ttlb: LatencyStats,
    /// MiB/s over the summed TTLB of successful samples
    pub throughput_mbps: f64,
    pub errors: usize,
}

#[derive(Debug, Default)]
pub struct Collector {
    samples: Mutex<Vec<Sample>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            samples: Mutex::new(Vec::with_capacity(n)),
        }
    }

    pub fn add_sample(&self, ttfb: Duration, ttlb: Duration, bytes: u64, error: Option<String>) {
        let sample = Sample {
            ttfb,
            ttlb,
            bytes,
            timestamp: Utc::now(),
            error,
        };
        self.samples.lock().push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute every statistic from the current sample set.
    pub fn calculate(&self) -> CollectorSummary {
        let samples = self.samples.lock();

        let errors = samples.iter().filter(|s| !s.is_ok()).count();
        let ok: Vec<&Sample> = samples.iter().filter(|s| s.is_ok()).collect();
        if ok.is_empty() {
            return CollectorSummary {
                errors,
                ..Default::default()
            };
        }

        let mut ttfbs: Vec<Duration> = ok.iter().map(|s| s.ttfb).collect();
        let mut ttlbs: Vec<Duration> = ok.iter().map(|s| s.ttlb).collect();
        ttfbs.sort_unstable();
        ttlbs.sort_unstable();

        let total_bytes: u64 = ok.iter().map(|s| s.bytes).sum();
        let total_secs: f64 = ok.iter().map(|s| s.ttlb.as_secs_f64()).sum();
        let throughput_mbps = if total_secs > 0.0 {
            total_bytes as f64 / total_secs / BYTES_PER_MIB
        } else {
            0.0
        };

        CollectorSummary {
            ttfb: LatencyStats::from_sorted(&ttfbs),
            ttlb: LatencyStats::from_sorted(&ttlbs),
            throughput_mbps,
            errors,
        }
    }
}

/// Outcome of one (driver, object size, threads) read load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub driver: String,
    pub object_size: u64,
    pub threads: usize,
    /// MiB/s
    pub throughput: f64,
    pub ttfb: LatencyStats,
    pub ttlb: LatencyStats,
    pub total_bytes: u64,
    #[serde(rename = "duration_us", with = "duration_micros")]
    pub duration: Duration,
    pub samples: usize,
    pub errors: usize,
}
