// -----------------------------------------------------------------------------
// s3-read-bench - comparative GET throughput/latency benchmark for
// S3-compatible storage backends
// -----------------------------------------------------------------------------

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Builder as RtBuilder;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use s3_read_bench::analysis::{analyze, ResultAnalysis};
use s3_read_bench::cleanup::cleanup_driver;
use s3_read_bench::config::BenchConfig;
use s3_read_bench::events::{BenchEvent, ChannelSink, NoopSink};
use s3_read_bench::metrics::BenchmarkResult;
use s3_read_bench::runner::{BenchmarkRunner, RunError};
use s3_read_bench::s3_client::S3ClientFactory;
use s3_read_bench::size_parser::format_size;
use s3_read_bench::store::ClientFactory;
use s3_read_bench::tsv_export::TsvExporter;

// -----------------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------------
#[derive(Parser)]
#[command(
    name = "s3-read-bench",
    version,
    about = "Compare GET throughput and latency across S3-compatible backends"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// TCP-probe the selected drivers and report which are reachable
    ///
    /// Examples:
    ///   s3-read-bench probe
    ///   s3-read-bench probe --config bench.yaml
    Probe {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run the read benchmark
    ///
    /// Examples:
    ///   s3-read-bench run --drivers minio,rustfs --samples 20
    ///   s3-read-bench run --config bench.yaml --results-tsv /tmp/bench --json /tmp/bench.json
    Run {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Comma-separated driver names (overrides the config's `drivers`)
        #[arg(long, value_delimiter = ',')]
        drivers: Vec<String>,

        /// Objects per category / reads per configuration
        #[arg(long)]
        samples: Option<usize>,

        /// Write <path>-results.tsv and <path>-scores.tsv
        #[arg(long)]
        results_tsv: Option<PathBuf>,

        /// Write results and analysis as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Delete every benchmark object left on the selected drivers
    Cleanup {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_delimiter = ',')]
        drivers: Vec<String>,
    },
}

// -----------------------------------------------------------------------------
// main
// -----------------------------------------------------------------------------
fn main() -> Result<()> {
    // AWS_* overrides, endpoints in .env, etc.
    dotenv().ok();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::new(format!("s3_read_bench={}", level));
    fmt().with_env_filter(filter).init();

    let rt = RtBuilder::new_multi_thread().enable_all().build()?;
    rt.block_on(async {
        match cli.command {
            Commands::Probe { config } => probe_cmd(config.as_deref()).await,
            Commands::Run {
                config,
                drivers,
                samples,
                results_tsv,
                json,
            } => {
                run_cmd(
                    config.as_deref(),
                    drivers,
                    samples,
                    results_tsv.as_deref(),
                    json.as_deref(),
                )
                .await
            }
            Commands::Cleanup { config, drivers } => cleanup_cmd(config.as_deref(), drivers).await,
        }
    })
}

fn load_config(path: Option<&Path>) -> Result<BenchConfig> {
    match path {
        Some(p) => BenchConfig::from_file(p),
        None => Ok(BenchConfig::default()),
    }
}

// -----------------------------------------------------------------------------
// Commands
// -----------------------------------------------------------------------------
async fn probe_cmd(config: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    let mut reachable = 0;
    for driver in cfg.selected_drivers() {
        match driver.check_connectivity(cfg.probe_timeout).await {
            Ok(()) => {
                reachable += 1;
                println!("[OK]   {:<12} {}", driver.name, driver.endpoint);
            }
            Err(e) => println!("[SKIP] {:<12} {:#}", driver.name, e),
        }
    }
    if reachable == 0 {
        bail!("no drivers reachable");
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    config: &'a BenchConfig,
    cancelled: bool,
    results: &'a [BenchmarkResult],
    analysis: &'a ResultAnalysis,
}

async fn run_cmd(
    config: Option<&Path>,
    drivers: Vec<String>,
    samples: Option<usize>,
    results_tsv: Option<&Path>,
    json: Option<&Path>,
) -> Result<()> {
    let mut cfg = load_config(config)?;
    if !drivers.is_empty() {
        cfg.drivers = drivers;
    }
    if let Some(n) = samples {
        cfg.samples = n;
    }
    cfg.validate()?;

    let (tx, rx) = unbounded_channel();
    let runner = BenchmarkRunner::new(cfg.clone(), Arc::new(S3ClientFactory))
        .with_sink(Arc::new(ChannelSink::new(tx)));
    info!(
        "Benchmarking {} driver(s): {}",
        runner.drivers().len(),
        runner.drivers().iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(", ")
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received: finishing in-flight reads and cleaning up");
                cancel.cancel();
            }
        });
    }

    let display = tokio::spawn(render_events(rx));
    let outcome = runner.run(&cancel).await;
    // closes the event channel so the display task can finish
    drop(runner);
    display.await.context("event display task")?;

    let (results, cancelled) = match outcome {
        Ok(results) => (results, false),
        Err(RunError::Cancelled { partial }) => (partial, true),
        Err(e) => return Err(e.into()),
    };

    let analysis = analyze(&results);
    print_summary(&results, &analysis);

    if let Some(base) = results_tsv {
        let exporter = TsvExporter::new(base);
        let rpath = exporter.export_results(&results)?;
        let spath = exporter.export_scores(&analysis.driver_scores)?;
        println!("\nTSV results exported to: {} and {}", rpath.display(), spath.display());
    }

    if let Some(path) = json {
        let report = JsonReport {
            generated_at: chrono::Local::now().to_rfc3339(),
            config: &cfg,
            cancelled,
            results: &results,
            analysis: &analysis,
        };
        let body = serde_json::to_string_pretty(&report).context("serialize JSON report")?;
        std::fs::write(path, body).with_context(|| format!("write {}", path.display()))?;
        println!("JSON report written to: {}", path.display());
    }

    if cancelled {
        bail!("benchmark cancelled; {} partial result(s) reported", results.len());
    }
    Ok(())
}

async fn cleanup_cmd(config: Option<&Path>, drivers: Vec<String>) -> Result<()> {
    let mut cfg = load_config(config)?;
    if !drivers.is_empty() {
        cfg.drivers = drivers;
    }
    let factory = S3ClientFactory;
    for driver in cfg.selected_drivers() {
        if let Err(e) = driver.check_connectivity(cfg.probe_timeout).await {
            println!("[SKIP] {}: {:#}", driver.name, e);
            continue;
        }
        let client = factory.connect(&driver).await?;
        match cleanup_driver(client.as_ref(), &driver, &NoopSink).await {
            Ok(stats) => println!(
                "[{}] deleted {} of {} objects ({} failed)",
                driver.name, stats.deleted, stats.listed, stats.failed
            ),
            Err(e) => println!("[{}] cleanup failed: {:#}", driver.name, e),
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------------
async fn render_events(mut rx: UnboundedReceiver<BenchEvent>) {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} {prefix:>9} [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }

    while let Some(event) = rx.recv().await {
        match event {
            BenchEvent::PhaseChange { phase, .. } => pb.set_prefix(phase.to_string()),
            BenchEvent::Progress {
                current,
                total,
                message,
            } => {
                pb.set_length(total as u64);
                pb.set_position(current as u64);
                pb.set_message(message);
            }
            BenchEvent::Log(msg) => pb.println(msg),
            BenchEvent::Result(r) => pb.println(format!(
                "  {:<12} {:>6} @ {:>3} threads  {:>9.1} MB/s  ttfb p50 {:>7.2} ms  p99 {:>7.2} ms  errors {}",
                r.driver,
                format_size(r.object_size),
                r.threads,
                r.throughput,
                r.ttfb.p50.as_secs_f64() * 1000.0,
                r.ttfb.p99.as_secs_f64() * 1000.0,
                r.errors
            )),
            BenchEvent::DriverError { driver, error } => {
                pb.println(format!("[{}] excluded from remaining categories: {}", driver, error))
            }
            // live dashboard feeds; the summary covers them
            BenchEvent::ThroughputSample { .. }
            | BenchEvent::DriverProgress { .. }
            | BenchEvent::ConfigChange { .. }
            | BenchEvent::LatencySample { .. } => {}
        }
    }
    pb.finish_and_clear();
}

fn print_summary(results: &[BenchmarkResult], analysis: &ResultAnalysis) {
    println!("\n=== Driver ranking ({} results) ===", results.len());
    for (i, s) in analysis.driver_scores.iter().enumerate() {
        println!(
            "{:>2}. {:<12} score {:>8.2}  avg {:>9.1} MB/s  ttfb p50 {:>7.2} ms  p99 {:>7.2} ms  stddev {:>7.2}  errors {}",
            i + 1,
            s.driver,
            s.total_score,
            s.avg_throughput,
            s.avg_ttfb_p50.as_secs_f64() * 1000.0,
            s.avg_ttfb_p99.as_secs_f64() * 1000.0,
            s.consistency,
            s.error_count
        );
    }

    if !analysis.category_winners.is_empty() {
        println!("\n=== Category winners ===");
        for w in &analysis.category_winners {
            match &w.runner_up {
                Some(r) => println!(
                    "{:<32} {:<12} {:>9.2} {}  (+{:.1}% over {})",
                    w.category, w.winner, w.value, w.unit, w.margin, r
                ),
                None => println!("{:<32} {:<12} {:>9.2} {}", w.category, w.winner, w.value, w.unit),
            }
        }
    }

    if !analysis.recommendations.is_empty() {
        println!("\n=== Recommendations ===");
        for r in &analysis.recommendations {
            println!("{:<28} {:<12} {}", r.use_case, r.driver, r.reason);
        }
    }
}
