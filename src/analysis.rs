//! Post-run analysis: composite driver scores, category winners and
//! recommendations.
//!
//! Scoring policy: 50% raw average throughput (MB/s), 30% latency score
//! `max(0, 100 - ttfb_p50_ms)`, 20% consistency score `max(0, 100 - 2*CV)`.
//! The latency term is not normalised and saturates at zero for drivers
//! slower than 100 ms.

use serde::Serialize;
use std::time::Duration;

use crate::metrics::BenchmarkResult;
use crate::serde_helpers::duration_micros;
use crate::size_parser::format_size;

pub const THROUGHPUT_WEIGHT: f64 = 0.5;
pub const LATENCY_WEIGHT: f64 = 0.3;
pub const CONSISTENCY_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverScore {
    pub driver: String,
    pub total_score: f64,
    pub avg_throughput: f64,
    #[serde(rename = "avg_ttfb_p50_us", with = "duration_micros")]
    pub avg_ttfb_p50: Duration,
    #[serde(rename = "avg_ttfb_p99_us", with = "duration_micros")]
    pub avg_ttfb_p99: Duration,
    /// Population standard deviation of per-result throughput
    pub consistency: f64,
    /// Number of results aggregated
    pub sample_count: usize,
    pub error_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryWinner {
    /// Stable identifier: "throughput", "ttfb_p50", "size_<bytes>_throughput", ...
    pub key: String,
    pub category: String,
    pub winner: String,
    pub value: f64,
    pub unit: &'static str,
    pub runner_up: Option<String>,
    pub runner_up_value: f64,
    /// Percentage lead over the runner-up
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub use_case: String,
    pub driver: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultAnalysis {
    pub overall_winner: Option<String>,
    /// Ranked: index 0 is rank 1
    pub driver_scores: Vec<DriverScore>,
    pub category_winners: Vec<CategoryWinner>,
    pub recommendations: Vec<Recommendation>,
}

impl ResultAnalysis {
    pub fn winner(&self, key: &str) -> Option<&CategoryWinner> {
        self.category_winners.iter().find(|w| w.key == key)
    }

    /// 1-based rank of a driver.
    pub fn rank_of(&self, driver: &str) -> Option<usize> {
        self.driver_scores
            .iter()
            .position(|s| s.driver == driver)
            .map(|i| i + 1)
    }
}

/// Analyse a full result set.
pub fn analyze(results: &[BenchmarkResult]) -> ResultAnalysis {
    // group by driver, first-seen order
    let mut grouped: Vec<(&str, Vec<&BenchmarkResult>)> = Vec::new();
    for res in results {
        match grouped.iter_mut().find(|(d, _)| *d == res.driver) {
            Some((_, v)) => v.push(res),
            None => grouped.push((res.driver.as_str(), vec![res])),
        }
    }

    let mut driver_scores: Vec<DriverScore> = grouped
        .iter()
        .map(|(driver, rs)| driver_score(driver, rs))
        .collect();
    // stable: equal scores keep first-seen order
    driver_scores.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));

    let mut analysis = ResultAnalysis {
        overall_winner: driver_scores.first().map(|s| s.driver.clone()),
        driver_scores,
        ..Default::default()
    };
    analysis.category_winners = category_winners(results);
    analysis.recommendations = recommendations(&analysis.driver_scores);
    analysis
}

/// Composite score for one driver's results.
pub fn driver_score(driver: &str, results: &[&BenchmarkResult]) -> DriverScore {
    if results.is_empty() {
        return DriverScore {
            driver: driver.to_string(),
            total_score: 0.0,
            avg_throughput: 0.0,
            avg_ttfb_p50: Duration::ZERO,
            avg_ttfb_p99: Duration::ZERO,
            consistency: 0.0,
            sample_count: 0,
            error_count: 0,
        };
    }

    let n = results.len() as f64;
    let avg_throughput = results.iter().map(|r| r.throughput).sum::<f64>() / n;
    let avg_ttfb_p50 = mean_duration(results.iter().map(|r| r.ttfb.p50), results.len());
    let avg_ttfb_p99 = mean_duration(results.iter().map(|r| r.ttfb.p99), results.len());
    let errors = results.iter().map(|r| r.errors).sum();

    let variance = results
        .iter()
        .map(|r| {
            let diff = r.throughput - avg_throughput;
            diff * diff
        })
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();

    let consistency_score = if avg_throughput > 0.0 {
        let cv = std_dev / avg_throughput * 100.0;
        (100.0 - cv * 2.0).max(0.0)
    } else {
        100.0
    };

    // whole milliseconds
    let latency_ms = avg_ttfb_p50.as_millis() as f64;
    let latency_score = (100.0 - latency_ms).max(0.0);

    let total_score = avg_throughput * THROUGHPUT_WEIGHT
        + latency_score * LATENCY_WEIGHT
        + consistency_score * CONSISTENCY_WEIGHT;

    DriverScore {
        driver: driver.to_string(),
        total_score,
        avg_throughput,
        avg_ttfb_p50,
        avg_ttfb_p99,
        consistency: std_dev,
        sample_count: results.len(),
        error_count: errors,
    }
}

fn mean_duration(values: impl Iterator<Item = Duration>, n: usize) -> Duration {
    if n == 0 {
        return Duration::ZERO;
    }
    let total: u128 = values.map(|d| d.as_nanos()).sum();
    Duration::from_nanos((total / n as u128) as u64)
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Best and second-best by linear scan. `better(a, b)` is true when `a`
/// strictly beats `b`, so ties keep whichever was seen first.
fn top_two<'a>(
    results: impl Iterator<Item = &'a BenchmarkResult>,
    better: impl Fn(&BenchmarkResult, &BenchmarkResult) -> bool,
) -> (Option<&'a BenchmarkResult>, Option<&'a BenchmarkResult>) {
    let mut best: Option<&BenchmarkResult> = None;
    let mut second: Option<&BenchmarkResult> = None;
    for res in results {
        match best {
            None => best = Some(res),
            Some(b) if better(res, b) => {
                second = best;
                best = Some(res);
            }
            _ => {
                if second.map_or(true, |s| better(res, s)) {
                    second = Some(res);
                }
            }
        }
    }
    (best, second)
}

fn throughput_winner(
    key: String,
    category: String,
    results: &[&BenchmarkResult],
) -> Option<CategoryWinner> {
    let (best, second) = top_two(results.iter().copied(), |a, b| a.throughput > b.throughput);
    let best = best?;
    let mut winner = CategoryWinner {
        key,
        category,
        winner: best.driver.clone(),
        value: best.throughput,
        unit: "MB/s",
        runner_up: None,
        runner_up_value: 0.0,
        margin: 0.0,
    };
    if let Some(s) = second.filter(|s| s.throughput > 0.0) {
        winner.runner_up = Some(s.driver.clone());
        winner.runner_up_value = s.throughput;
        winner.margin = (best.throughput - s.throughput) / s.throughput * 100.0;
    }
    Some(winner)
}

fn ttfb_winner(key: String, category: String, results: &[&BenchmarkResult]) -> Option<CategoryWinner> {
    // results with no successful reads have a zero p50 and cannot win
    let (best, second) = top_two(
        results.iter().copied().filter(|r| !r.ttfb.p50.is_zero()),
        |a, b| a.ttfb.p50 < b.ttfb.p50,
    );
    let best = best?;
    let mut winner = CategoryWinner {
        key,
        category,
        winner: best.driver.clone(),
        value: ms(best.ttfb.p50),
        unit: "ms",
        runner_up: None,
        runner_up_value: 0.0,
        margin: 0.0,
    };
    if let Some(s) = second {
        let runner = ms(s.ttfb.p50);
        winner.runner_up = Some(s.driver.clone());
        winner.runner_up_value = runner;
        winner.margin = (runner - winner.value) / runner * 100.0;
    }
    Some(winner)
}

fn category_winners(results: &[BenchmarkResult]) -> Vec<CategoryWinner> {
    let all: Vec<&BenchmarkResult> = results.iter().collect();
    let mut winners = Vec::new();
    winners.extend(throughput_winner("throughput".into(), "Best Throughput".into(), &all));
    winners.extend(ttfb_winner("ttfb_p50".into(), "Lowest TTFB p50".into(), &all));

    let mut sizes: Vec<u64> = results.iter().map(|r| r.object_size).collect();
    sizes.sort_unstable();
    sizes.dedup();
    for size in sizes {
        let of_size: Vec<&BenchmarkResult> = results.iter().filter(|r| r.object_size == size).collect();
        let label = format_size(size);
        winners.extend(throughput_winner(
            format!("size_{}_throughput", size),
            format!("{} Objects - Throughput", label),
            &of_size,
        ));
        winners.extend(ttfb_winner(
            format!("size_{}_ttfb_p50", size),
            format!("{} Objects - TTFB p50", label),
            &of_size,
        ));
    }
    winners
}

fn recommendations(scores: &[DriverScore]) -> Vec<Recommendation> {
    let mut out = Vec::new();

    let mut best_throughput: Option<&DriverScore> = None;
    let mut best_latency: Option<&DriverScore> = None;
    let mut most_consistent: Option<&DriverScore> = None;
    for s in scores {
        if best_throughput.map_or(true, |b| s.avg_throughput > b.avg_throughput) {
            best_throughput = Some(s);
        }
        if !s.avg_ttfb_p50.is_zero() && best_latency.map_or(true, |b| s.avg_ttfb_p50 < b.avg_ttfb_p50) {
            best_latency = Some(s);
        }
        if most_consistent.map_or(true, |b| s.consistency < b.consistency) {
            most_consistent = Some(s);
        }
    }

    if let Some(s) = best_throughput {
        out.push(Recommendation {
            use_case: "High-Throughput Workloads".into(),
            driver: s.driver.clone(),
            reason: format!("Delivers highest average throughput at {:.1} MB/s", s.avg_throughput),
        });
    }
    if let Some(s) = best_latency {
        out.push(Recommendation {
            use_case: "Latency-Sensitive Workloads".into(),
            driver: s.driver.clone(),
            reason: format!("Lowest median latency at {} ms (p50)", s.avg_ttfb_p50.as_millis()),
        });
    }
    if let (Some(c), Some(t)) = (most_consistent, best_throughput) {
        if c.driver != t.driver {
            out.push(Recommendation {
                use_case: "Consistent Performance".into(),
                driver: c.driver.clone(),
                reason: format!(
                    "Most consistent throughput with lowest variance ({:.2} MB/s std dev)",
                    c.consistency
                ),
            });
        }
    }
    out
}
