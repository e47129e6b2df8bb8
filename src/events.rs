//! Progress events emitted by the benchmark core.
//!
//! Consumers (terminal dashboards, report writers) implement [`EventSink`].
//! Emission is fire-and-forget: the core never waits on a consumer beyond
//! the cost of the `emit` call itself.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use crate::metrics::BenchmarkResult;

/// Orchestrator state. Each category walks Setup → Benchmark → Cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    Setup,
    Benchmark,
    Cleanup,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => write!(f, "INIT"),
            Phase::Setup => write!(f, "SETUP"),
            Phase::Benchmark => write!(f, "BENCHMARK"),
            Phase::Cleanup => write!(f, "CLEANUP"),
            Phase::Done => write!(f, "DONE"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum BenchEvent {
    PhaseChange {
        phase: Phase,
        driver: Option<String>,
    },
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    Result(BenchmarkResult),
    Log(String),
    ThroughputSample {
        driver: String,
        mbps: f64,
        timestamp: DateTime<Utc>,
    },
    DriverProgress {
        driver: String,
        completed: usize,
        total: usize,
        mbps: f64,
    },
    ConfigChange {
        object_size: u64,
        threads: usize,
    },
    LatencySample {
        driver: String,
        ttfb: Duration,
        ttlb: Duration,
    },
    DriverError {
        driver: String,
        error: String,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: BenchEvent);
}

/// Discards everything. Used when nobody is listening.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: BenchEvent) {}
}

/// Forwards events into an unbounded channel; a dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<BenchEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<BenchEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: BenchEvent) {
        let _ = self.tx.send(event);
    }
}

impl<F> EventSink for F
where
    F: Fn(BenchEvent) + Send + Sync,
{
    fn emit(&self, event: BenchEvent) {
        self(event)
    }
}
