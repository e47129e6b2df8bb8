// src/lib.rs

pub mod analysis; // Composite scoring, category winners, recommendations
pub mod cleanup;
pub mod config;
pub mod constants;
pub mod driver; // Driver registry + TCP liveness probe
pub mod events;
pub mod metrics; // Sample collector and latency statistics
pub mod prepare;
pub mod runner; // Per-category SETUP → BENCHMARK → CLEANUP orchestrator
pub mod s3_client;
pub mod serde_helpers;
pub mod size_parser;
pub mod store; // Storage client contract
pub mod tsv_export;
pub mod ttfb;
pub mod workload; // Bounded-concurrency read load

pub use analysis::{analyze, ResultAnalysis};
pub use config::BenchConfig;
pub use driver::DriverConfig;
pub use events::{BenchEvent, EventSink, Phase};
pub use metrics::BenchmarkResult;
pub use runner::{BenchmarkRunner, RunError};
pub use store::{ClientFactory, ObjectClient};
