// src/config.rs
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    DEFAULT_OBJECT_SIZES, DEFAULT_PROBE_TIMEOUT, DEFAULT_REPORT_INTERVAL, DEFAULT_SAMPLES,
    DEFAULT_THREAD_COUNTS,
};
use crate::driver::{default_drivers, filter_drivers, DriverConfig};
use crate::size_parser::deserialize_sizes;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BenchConfig {
    /// Objects uploaded per category and GETs issued per configuration.
    #[serde(default = "default_samples")]
    pub samples: usize,

    /// Object-size categories, as byte counts or size strings ("64KiB", "4MiB").
    #[serde(default = "default_object_sizes", deserialize_with = "deserialize_sizes")]
    pub object_sizes: Vec<u64>,

    /// Concurrency levels swept for each driver.
    #[serde(default = "default_thread_counts")]
    pub thread_counts: Vec<usize>,

    /// Driver names to run. Empty means every enabled driver.
    #[serde(default)]
    pub drivers: Vec<String>,

    /// Period of the live throughput reporter (e.g. "250ms").
    #[serde(default = "default_report_interval", with = "humantime_serde")]
    pub report_interval: Duration,

    /// TCP connect timeout for the pre-flight liveness probe (e.g. "2s").
    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Probe every driver before the first category and skip unreachable ones.
    #[serde(default = "default_true")]
    pub probe_drivers: bool,

    /// Backend definitions replacing the built-in registry when non-empty.
    #[serde(default)]
    pub endpoints: Vec<DriverConfig>,
}

fn default_samples() -> usize {
    DEFAULT_SAMPLES
}

fn default_object_sizes() -> Vec<u64> {
    DEFAULT_OBJECT_SIZES.to_vec()
}

fn default_thread_counts() -> Vec<usize> {
    DEFAULT_THREAD_COUNTS.to_vec()
}

fn default_report_interval() -> Duration {
    DEFAULT_REPORT_INTERVAL
}

fn default_probe_timeout() -> Duration {
    DEFAULT_PROBE_TIMEOUT
}

fn default_true() -> bool {
    true
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            object_sizes: default_object_sizes(),
            thread_counts: default_thread_counts(),
            drivers: Vec::new(),
            report_interval: default_report_interval(),
            probe_timeout: default_probe_timeout(),
            probe_drivers: true,
            endpoints: Vec::new(),
        }
    }
}

impl BenchConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(yaml).context("parse benchmark config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_yaml_str(&buf).with_context(|| format!("load {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            bail!("samples must be at least 1");
        }
        if self.object_sizes.is_empty() {
            bail!("object_sizes must name at least one size");
        }
        if self.object_sizes.contains(&0) {
            bail!("object_sizes must be non-zero");
        }
        if self.thread_counts.is_empty() {
            bail!("thread_counts must name at least one concurrency level");
        }
        if self.thread_counts.contains(&0) {
            bail!("thread_counts must be non-zero");
        }
        if self.report_interval.is_zero() {
            bail!("report_interval must be non-zero");
        }
        Ok(())
    }

    /// Size categories in the order they run: ascending, de-duplicated.
    pub fn payload_sizes(&self) -> Vec<u64> {
        let mut v = self.object_sizes.clone();
        v.sort_unstable();
        v.dedup();
        v
    }

    /// Concurrency levels in the order they run: ascending, de-duplicated.
    pub fn thread_counts(&self) -> Vec<usize> {
        let mut v = self.thread_counts.clone();
        v.sort_unstable();
        v.dedup();
        v
    }

    /// Registry (built-in or `endpoints`) narrowed by the `drivers` filter.
    pub fn selected_drivers(&self) -> Vec<DriverConfig> {
        let all = if self.endpoints.is_empty() {
            default_drivers()
        } else {
            self.endpoints.clone()
        };
        filter_drivers(all, &self.drivers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let cfg = BenchConfig::from_yaml_str("{}").unwrap();
        assert_eq!(cfg.samples, DEFAULT_SAMPLES);
        assert_eq!(cfg.payload_sizes(), DEFAULT_OBJECT_SIZES.to_vec());
        assert_eq!(cfg.thread_counts(), DEFAULT_THREAD_COUNTS.to_vec());
        assert_eq!(cfg.report_interval, Duration::from_millis(250));
        assert!(cfg.probe_drivers);
        assert_eq!(cfg.selected_drivers().len(), default_drivers().len());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
samples: 10
object_sizes: ["4MiB", 1024, "4MiB"]
thread_counts: [8, 4]
drivers: [fast]
report_interval: 100ms
probe_timeout: 1s
probe_drivers: false
endpoints:
  - name: fast
    endpoint: http://127.0.0.1:9000
    access_key: a
    secret_key: b
    bucket: bench
  - name: slow
    endpoint: http://127.0.0.1:9100
    access_key: a
    secret_key: b
    bucket: bench
    region: eu-west-1
"#;
        let cfg = BenchConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.samples, 10);
        assert_eq!(cfg.payload_sizes(), vec![1024, 4 * 1024 * 1024]);
        assert_eq!(cfg.thread_counts(), vec![4, 8]);
        assert_eq!(cfg.report_interval, Duration::from_millis(100));
        assert_eq!(cfg.probe_timeout, Duration::from_secs(1));
        assert!(!cfg.probe_drivers);

        let drivers = cfg.selected_drivers();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].name, "fast");
        assert_eq!(drivers[0].region, "us-east-1");
        assert_eq!(cfg.endpoints[1].region, "eu-west-1");
    }

    #[test]
    fn test_validation_errors() {
        assert!(BenchConfig::from_yaml_str("samples: 0").is_err());
        assert!(BenchConfig::from_yaml_str("object_sizes: []").is_err());
        assert!(BenchConfig::from_yaml_str("object_sizes: [0]").is_err());
        assert!(BenchConfig::from_yaml_str("thread_counts: [4, 0]").is_err());
        assert!(BenchConfig::from_yaml_str("object_sizes: [\"4QB\"]").is_err());
    }

    #[test]
    fn test_serialized_config_omits_credentials() {
        let cfg = BenchConfig {
            endpoints: vec![DriverConfig::new("m", "http://h:1", "AKIAEXAMPLE", "TOPSECRET", "b")],
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("TOPSECRET"));
        assert!(!json.contains("AKIAEXAMPLE"));
        assert!(json.contains("\"bucket\":\"b\""));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.yaml");
        std::fs::write(&path, "samples: 3\nthread_counts: [2]\n").unwrap();
        let cfg = BenchConfig::from_file(&path).unwrap();
        assert_eq!(cfg.samples, 3);
        assert_eq!(cfg.thread_counts(), vec![2]);

        assert!(BenchConfig::from_file(dir.path().join("missing.yaml")).is_err());
    }
}
