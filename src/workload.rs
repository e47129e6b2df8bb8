// src/workload.rs
//
// Bounded-concurrency read load: one GET per prepared object, at most
// `threads` in flight, every outcome recorded as a Sample.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::BYTES_PER_MIB;
use crate::events::{BenchEvent, EventSink};
use crate::metrics::{BenchmarkResult, Collector};
use crate::prepare::object_key;
use crate::size_parser::format_size;
use crate::store::ObjectClient;
use crate::ttfb::TtfbReader;

const MIN_REPORT_INTERVAL: Duration = Duration::from_millis(1);

/// Shape of one read load.
#[derive(Debug, Clone)]
pub struct ReadLoad {
    pub driver: String,
    pub object_size: u64,
    pub threads: usize,
    /// Number of GETs, one per prepared object index
    pub samples: usize,
    pub report_interval: Duration,
}

/// Result of a load plus whether dispatch stopped early on cancellation.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub result: BenchmarkResult,
    pub cancelled: bool,
}

/// Counters shared between read tasks and the reporter.
#[derive(Default)]
struct Totals {
    bytes: AtomicU64,
    completed: AtomicU64,
}

/// Periodic live-throughput task, scoped to one load.
///
/// Dropping the guard stops the task, so an early return from the load
/// cannot leave it running.
struct Reporter {
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Reporter {
    fn spawn(load: &ReadLoad, totals: Arc<Totals>, sink: Arc<dyn EventSink>) -> Self {
        let stop = CancellationToken::new();
        let token = stop.clone();
        let driver = load.driver.clone();
        let total = load.samples;
        // tokio intervals reject a zero period
        let period = load.report_interval.max(MIN_REPORT_INTERVAL);
        let start = Instant::now();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let bytes = totals.bytes.load(Ordering::Relaxed);
                        let elapsed = start.elapsed().as_secs_f64();
                        if elapsed > 0.0 && bytes > 0 {
                            let mbps = bytes as f64 / elapsed / BYTES_PER_MIB;
                            sink.emit(BenchEvent::ThroughputSample {
                                driver: driver.clone(),
                                mbps,
                                timestamp: chrono::Utc::now(),
                            });
                            sink.emit(BenchEvent::DriverProgress {
                                driver: driver.clone(),
                                completed: totals.completed.load(Ordering::Relaxed) as usize,
                                total,
                                mbps,
                            });
                        }
                    }
                }
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Signal the task and wait for it to exit.
    async fn shutdown(mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("throughput reporter ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Issue `load.samples` GETs against the objects prepared for
/// (driver, object_size), at most `load.threads` at a time.
///
/// Cancellation is checked before each dispatch. In-flight reads are never
/// preempted: once dispatch stops, outstanding reads are awaited and the
/// statistics cover whatever was attempted.
pub async fn run_read_load(
    load: &ReadLoad,
    client: Arc<dyn ObjectClient>,
    sink: Arc<dyn EventSink>,
    cancel: &CancellationToken,
) -> Result<LoadOutcome> {
    let collector = Arc::new(Collector::with_capacity(load.samples));
    let totals = Arc::new(Totals::default());
    let sem = Arc::new(Semaphore::new(load.threads.max(1)));
    let start = Instant::now();

    let reporter = Reporter::spawn(load, totals.clone(), sink.clone());

    let mut tasks = JoinSet::new();
    let mut dispatched = 0usize;
    let mut cancelled = false;

    for idx in 0..load.samples {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            permit = sem.clone().acquire_owned() => permit.context("read semaphore closed")?,
        };
        dispatched += 1;

        let client = client.clone();
        let collector = collector.clone();
        let totals = totals.clone();
        let sink = sink.clone();
        let driver = load.driver.clone();
        let object_size = load.object_size;
        let threads = load.threads;
        let total = load.samples;

        tasks.spawn(async move {
            let _permit = permit;
            let key = object_key(&driver, object_size, idx);
            let op_start = Instant::now();

            match client.get(&key).await {
                Err(e) => {
                    debug!("[{}] GET {} failed: {:#}", driver, key, e);
                    collector.add_sample(Duration::ZERO, Duration::ZERO, 0, Some(format!("{:#}", e)));
                }
                Ok(stream) => {
                    let mut reader = TtfbReader::new(stream, op_start);
                    let copied = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                    let ttlb = op_start.elapsed();
                    // empty body: first byte and last byte coincide
                    let ttfb = reader.ttfb().unwrap_or(ttlb);
                    match copied {
                        Ok(n) => {
                            collector.add_sample(ttfb, ttlb, n, None);
                            totals.bytes.fetch_add(n, Ordering::Relaxed);
                            sink.emit(BenchEvent::LatencySample {
                                driver: driver.clone(),
                                ttfb,
                                ttlb,
                            });
                        }
                        Err(e) => {
                            debug!("[{}] reading {} failed: {}", driver, key, e);
                            collector.add_sample(
                                Duration::ZERO,
                                Duration::ZERO,
                                0,
                                Some(format!("read body: {}", e)),
                            );
                        }
                    }
                }
            }

            let done = totals.completed.fetch_add(1, Ordering::Relaxed) + 1;
            sink.emit(BenchEvent::Progress {
                current: done as usize,
                total,
                message: format!("[{}] {} @ {} threads", driver, format_size(object_size), threads),
            });
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!("[{}] read task failed: {}", load.driver, e);
        }
    }
    reporter.shutdown().await;
    let duration = start.elapsed();

    let summary = collector.calculate();
    sink.emit(BenchEvent::ThroughputSample {
        driver: load.driver.clone(),
        mbps: summary.throughput_mbps,
        timestamp: chrono::Utc::now(),
    });
    sink.emit(BenchEvent::DriverProgress {
        driver: load.driver.clone(),
        completed: dispatched,
        total: load.samples,
        mbps: summary.throughput_mbps,
    });

    info!(
        "[{}] {} @ {} threads: {:.1} MB/s, ttfb p50 {:?}, ttlb p99 {:?}, {} errors{}",
        load.driver,
        format_size(load.object_size),
        load.threads,
        summary.throughput_mbps,
        summary.ttfb.p50,
        summary.ttlb.p99,
        summary.errors,
        if cancelled { " (cancelled)" } else { "" }
    );

    Ok(LoadOutcome {
        result: BenchmarkResult {
            driver: load.driver.clone(),
            object_size: load.object_size,
            threads: load.threads,
            throughput: summary.throughput_mbps,
            ttfb: summary.ttfb,
            ttlb: summary.ttlb,
            total_bytes: load.object_size * dispatched as u64,
            duration,
            samples: dispatched,
            errors: summary.errors,
        },
        cancelled,
    })
}
