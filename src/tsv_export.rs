//! TSV export for machine-readable benchmark results

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::analysis::DriverScore;
use crate::metrics::BenchmarkResult;

const RESULTS_HEADER: &str = "driver\tobject_size\tthreads\tthroughput_mibps\tttfb_avg_us\tttfb_p50_us\tttfb_p90_us\tttfb_p99_us\tttlb_avg_us\tttlb_p50_us\tttlb_p90_us\tttlb_p99_us\ttotal_bytes\tduration_ms\tsamples\terrors";

const SCORES_HEADER: &str =
    "rank\tdriver\tscore\tavg_throughput_mibps\tavg_ttfb_p50_us\tavg_ttfb_p99_us\tthroughput_stddev\tresults\terrors";

/// TSV exporter writing `<base>-results.tsv` and `<base>-scores.tsv`
pub struct TsvExporter {
    basename: String,
}

impl TsvExporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            basename: path.as_ref().to_string_lossy().to_string(),
        }
    }

    pub fn results_path(&self) -> PathBuf {
        PathBuf::from(format!("{}-results.tsv", self.basename))
    }

    pub fn scores_path(&self) -> PathBuf {
        PathBuf::from(format!("{}-scores.tsv", self.basename))
    }

    /// One row per (driver, size, threads) result, in run order
    pub fn export_results(&self, results: &[BenchmarkResult]) -> Result<PathBuf> {
        let path = self.results_path();
        let mut f = create(&path)?;
        writeln!(f, "{}", RESULTS_HEADER)?;
        for r in results {
            writeln!(
                f,
                "{}\t{}\t{}\t{:.2}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.1}\t{}\t{}",
                r.driver,
                r.object_size,
                r.threads,
                r.throughput,
                r.ttfb.avg.as_micros(),
                r.ttfb.p50.as_micros(),
                r.ttfb.p90.as_micros(),
                r.ttfb.p99.as_micros(),
                r.ttlb.avg.as_micros(),
                r.ttlb.p50.as_micros(),
                r.ttlb.p90.as_micros(),
                r.ttlb.p99.as_micros(),
                r.total_bytes,
                r.duration.as_secs_f64() * 1000.0,
                r.samples,
                r.errors
            )?;
        }
        f.flush()?;
        Ok(path)
    }

    /// Ranked driver scores, rank 1 first
    pub fn export_scores(&self, scores: &[DriverScore]) -> Result<PathBuf> {
        let path = self.scores_path();
        let mut f = create(&path)?;
        writeln!(f, "{}", SCORES_HEADER)?;
        for (i, s) in scores.iter().enumerate() {
            writeln!(
                f,
                "{}\t{}\t{:.2}\t{:.2}\t{}\t{}\t{:.2}\t{}\t{}",
                i + 1,
                s.driver,
                s.total_score,
                s.avg_throughput,
                s.avg_ttfb_p50.as_micros(),
                s.avg_ttfb_p99.as_micros(),
                s.consistency,
                s.sample_count,
                s.error_count
            )?;
        }
        f.flush()?;
        Ok(path)
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let f = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(f))
}
