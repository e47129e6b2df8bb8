// src/constants.rs
//
// Central location for the defaults used throughout s3-read-bench.

use std::time::Duration;

// =============================================================================
// Run shape
// =============================================================================

/// Objects uploaded per (driver, size) category, and GETs issued per
/// (driver, size, threads) configuration.
pub const DEFAULT_SAMPLES: usize = 100;

/// Object-size categories benchmarked when the config names none
pub const DEFAULT_OBJECT_SIZES: [u64; 4] = [
    1024,            // 1 KiB
    64 * 1024,       // 64 KiB
    1024 * 1024,     // 1 MiB
    4 * 1024 * 1024, // 4 MiB
];

/// Concurrency levels swept for every driver within a category
pub const DEFAULT_THREAD_COUNTS: [usize; 3] = [1, 4, 16];

// =============================================================================
// Timing
// =============================================================================

/// Period of the live throughput reporter attached to each read load
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(250);

/// TCP connect timeout for the driver liveness probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Keys and units
// =============================================================================

/// Leading component of every benchmark object key
pub const KEY_PREFIX: &str = "s3bench";

/// Bytes per MiB; all throughput figures are MiB/s reported as "MB/s"
pub const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Region used when a driver does not name one
pub const DEFAULT_REGION: &str = "us-east-1";
