//! Benchmark orchestrator.
//!
//! Categories (object sizes) run one after another. Each one walks
//! SETUP → BENCHMARK → CLEANUP before the next starts, so at most one
//! category's objects exist on any backend at a time.
//!
//! A driver whose SETUP fails is marked failed for the remainder of the run.
//! Cancellation is honoured at category boundaries, before each driver's
//! setup, before each (driver, threads) load and inside the load's dispatch
//! loop; whatever category was populated still gets cleaned up.

use anyhow::Context;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cleanup::cleanup_category;
use crate::config::BenchConfig;
use crate::driver::DriverConfig;
use crate::events::{BenchEvent, EventSink, NoopSink, Phase};
use crate::metrics::BenchmarkResult;
use crate::prepare::populate_category;
use crate::size_parser::format_size;
use crate::store::ClientFactory;
use crate::workload::{run_read_load, LoadOutcome, ReadLoad};

#[derive(Debug, Error)]
pub enum RunError {
    /// Cancellation observed; `partial` holds every result completed before it.
    #[error("benchmark cancelled ({} results completed)", .partial.len())]
    Cancelled { partial: Vec<BenchmarkResult> },

    #[error(
        "no drivers available (skipped: {}); start the storage backends or adjust `drivers`/`endpoints`",
        .skipped.join(", ")
    )]
    NoDriversAvailable { skipped: Vec<String> },

    #[error(transparent)]
    Config(#[from] anyhow::Error),
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled { .. })
    }

    /// Results gathered before the run stopped, if any.
    pub fn partial_results(&self) -> &[BenchmarkResult] {
        match self {
            RunError::Cancelled { partial } => partial,
            _ => &[],
        }
    }
}

/// Shared run state. Locked only for the duration of each access.
#[derive(Default)]
struct RunState {
    results: Vec<BenchmarkResult>,
    failed_drivers: HashSet<String>,
}

pub struct BenchmarkRunner {
    config: BenchConfig,
    drivers: Vec<DriverConfig>,
    factory: Arc<dyn ClientFactory>,
    sink: Arc<dyn EventSink>,
    state: Mutex<RunState>,
}

impl BenchmarkRunner {
    /// Runner over the drivers selected by `config`, with no event consumer.
    pub fn new(config: BenchConfig, factory: Arc<dyn ClientFactory>) -> Self {
        let drivers = config.selected_drivers();
        Self {
            config,
            drivers,
            factory,
            sink: Arc::new(NoopSink),
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn with_drivers(mut self, drivers: Vec<DriverConfig>) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn drivers(&self) -> &[DriverConfig] {
        &self.drivers
    }

    /// Results produced so far, in completion order.
    pub fn results(&self) -> Vec<BenchmarkResult> {
        self.state.lock().results.clone()
    }

    /// Drivers excluded after a failed SETUP, sorted by name.
    pub fn failed_drivers(&self) -> Vec<String> {
        let mut v: Vec<String> = self.state.lock().failed_drivers.iter().cloned().collect();
        v.sort();
        v
    }

    fn is_failed(&self, driver: &str) -> bool {
        self.state.lock().failed_drivers.contains(driver)
    }

    fn mark_failed(&self, driver: &str, err: &anyhow::Error) {
        self.state.lock().failed_drivers.insert(driver.to_string());
        self.sink.emit(BenchEvent::DriverError {
            driver: driver.to_string(),
            error: format!("{:#}", err),
        });
    }

    fn push_result(&self, result: BenchmarkResult) {
        self.state.lock().results.push(result.clone());
        self.sink.emit(BenchEvent::Result(result));
    }

    fn phase(&self, phase: Phase) {
        info!("Phase: {}", phase);
        self.sink.emit(BenchEvent::PhaseChange { phase, driver: None });
    }

    fn log_info(&self, msg: String) {
        info!("{}", msg);
        self.sink.emit(BenchEvent::Log(msg));
    }

    fn log_warn(&self, msg: String) {
        warn!("{}", msg);
        self.sink.emit(BenchEvent::Log(msg));
    }

    fn progress(&self, current: usize, total: usize, message: String) {
        self.sink.emit(BenchEvent::Progress {
            current,
            total,
            message,
        });
    }

    fn cancelled(&self) -> RunError {
        self.log_warn("Benchmark cancelled".to_string());
        RunError::Cancelled {
            partial: self.results(),
        }
    }

    /// TCP-probe every configured driver; unreachable ones are skipped for the whole run.
    pub async fn check_drivers(&self) -> Vec<DriverConfig> {
        let mut available = Vec::with_capacity(self.drivers.len());
        for driver in &self.drivers {
            match driver.check_connectivity(self.config.probe_timeout).await {
                Ok(()) => {
                    self.log_info(format!("[OK] {} at {}", driver.name, driver.endpoint));
                    available.push(driver.clone());
                }
                Err(e) => self.log_warn(format!("[SKIP] {}: {:#}", driver.name, e)),
            }
        }
        available
    }

    /// Execute every category and return the results in completion order.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<Vec<BenchmarkResult>, RunError> {
        self.config.validate()?;
        self.phase(Phase::Init);

        let available = if self.config.probe_drivers {
            self.check_drivers().await
        } else {
            self.drivers.clone()
        };
        if available.is_empty() {
            return Err(RunError::NoDriversAvailable {
                skipped: self.drivers.iter().map(|d| d.name.clone()).collect(),
            });
        }

        let sizes = self.config.payload_sizes();
        let thread_counts = self.config.thread_counts();
        let samples = self.config.samples;

        for (size_idx, &size) in sizes.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(self.cancelled());
            }

            // === SETUP ===
            self.phase(Phase::Setup);
            self.log_info(format!(
                "=== Category {}/{}: {} objects ===",
                size_idx + 1,
                sizes.len(),
                format_size(size)
            ));

            let mut populated: Vec<&DriverConfig> = Vec::with_capacity(available.len());
            for (i, driver) in available.iter().enumerate() {
                if self.is_failed(&driver.name) {
                    continue;
                }
                if cancel.is_cancelled() {
                    return Err(self.abort_category(&populated, size).await);
                }
                populated.push(driver);

                self.progress(
                    0,
                    samples,
                    format!(
                        "[{}] Uploading {} objects ({}/{} drivers)...",
                        driver.name,
                        format_size(size),
                        i + 1,
                        available.len()
                    ),
                );
                self.sink.emit(BenchEvent::DriverProgress {
                    driver: driver.name.clone(),
                    completed: 0,
                    total: samples,
                    mbps: 0.0,
                });

                if let Err(e) = self.setup_driver(driver, size, cancel).await {
                    if cancel.is_cancelled() {
                        return Err(self.abort_category(&populated, size).await);
                    }
                    error!("[{}] Setup failed: {:#}", driver.name, e);
                    self.sink.emit(BenchEvent::Log(format!(
                        "[ERROR] Setup failed for {}: {:#}",
                        driver.name, e
                    )));
                    self.mark_failed(&driver.name, &e);
                    self.progress(
                        0,
                        samples,
                        format!("[{}] FAILED - moving to next driver...", driver.name),
                    );
                }
            }

            // === BENCHMARK ===
            self.phase(Phase::Benchmark);
            for driver in &available {
                if self.is_failed(&driver.name) {
                    continue;
                }
                for &threads in &thread_counts {
                    if cancel.is_cancelled() {
                        return Err(self.abort_category(&populated, size).await);
                    }

                    self.sink.emit(BenchEvent::ConfigChange {
                        object_size: size,
                        threads,
                    });
                    self.progress(
                        0,
                        samples,
                        format!(
                            "[{}] Benchmarking {} @ {} threads...",
                            driver.name,
                            format_size(size),
                            threads
                        ),
                    );

                    match self.benchmark_driver(driver, size, threads, cancel).await {
                        Ok(LoadOutcome { cancelled: true, result }) => {
                            self.log_warn(format!(
                                "[{}] Discarding truncated load ({} of {} reads dispatched)",
                                driver.name, result.samples, samples
                            ));
                            return Err(self.abort_category(&populated, size).await);
                        }
                        Ok(outcome) => self.push_result(outcome.result),
                        Err(e) => {
                            error!("[{}] Benchmark failed: {:#}", driver.name, e);
                            self.sink.emit(BenchEvent::Log(format!(
                                "[ERROR] Benchmark failed for {}: {:#}",
                                driver.name, e
                            )));
                            self.progress(
                                0,
                                samples,
                                format!("[{}] FAILED - continuing...", driver.name),
                            );
                        }
                    }
                }
            }

            // === CLEANUP ===
            self.phase(Phase::Cleanup);
            self.cleanup_size(&populated, size).await;
            self.log_info(format!("=== Completed category: {} objects ===", format_size(size)));
        }

        self.phase(Phase::Done);
        Ok(self.results())
    }

    async fn setup_driver(
        &self,
        driver: &DriverConfig,
        size: u64,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let client = self.factory.connect(driver).await.context("create client")?;
        populate_category(
            client.as_ref(),
            driver,
            size,
            self.config.samples,
            self.sink.as_ref(),
            cancel,
        )
        .await?;
        Ok(())
    }

    async fn benchmark_driver(
        &self,
        driver: &DriverConfig,
        size: u64,
        threads: usize,
        cancel: &CancellationToken,
    ) -> anyhow::Result<LoadOutcome> {
        let client = self.factory.connect(driver).await.context("create client")?;
        let load = ReadLoad {
            driver: driver.name.clone(),
            object_size: size,
            threads,
            samples: self.config.samples,
            report_interval: self.config.report_interval,
        };
        run_read_load(&load, client, self.sink.clone(), cancel).await
    }

    /// Clean the interrupted category, then report cancellation.
    async fn abort_category(&self, populated: &[&DriverConfig], size: u64) -> RunError {
        self.phase(Phase::Cleanup);
        self.cleanup_size(populated, size).await;
        self.cancelled()
    }

    /// Remove one category from every driver that reached its SETUP.
    /// Failures are warnings; the remaining drivers are still cleaned.
    async fn cleanup_size(&self, drivers: &[&DriverConfig], size: u64) {
        for (i, driver) in drivers.iter().enumerate() {
            self.progress(
                i,
                drivers.len(),
                format!("[{}] Cleaning up {} objects...", driver.name, format_size(size)),
            );
            let outcome = match self.factory.connect(driver).await.context("create client") {
                Ok(client) => cleanup_category(client.as_ref(), driver, size, self.sink.as_ref()).await,
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                self.log_warn(format!("[WARN] Cleanup failed for {}: {:#}", driver.name, e));
            }
        }
        self.progress(
            drivers.len(),
            drivers.len(),
            format!("Cleanup complete for {} objects", format_size(size)),
        );
    }
}
