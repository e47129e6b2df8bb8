//! Driver registry: the storage backends under test and their liveness probe.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use url::Url;

use crate::constants::DEFAULT_REGION;

/// One configured storage backend. Identity is `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub name: String,
    /// Base URL of the S3 API, e.g. "http://localhost:9000"
    pub endpoint: String,
    /// Read from config, never written back out (reports embed the config).
    #[serde(skip_serializing)]
    pub access_key: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_enabled() -> bool {
    true
}

impl DriverConfig {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            bucket: bucket.into(),
            region: default_region(),
            enabled: true,
        }
    }

    /// `host:port` of the endpoint, using the scheme's default port when none is given.
    pub fn socket_addr(&self) -> Result<String> {
        let url = Url::parse(&self.endpoint)
            .with_context(|| format!("invalid endpoint for {}: {}", self.name, self.endpoint))?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("endpoint has no host: {}", self.endpoint))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| anyhow!("endpoint has no port: {}", self.endpoint))?;
        Ok(format!("{}:{}", host, port))
    }

    /// Liveness probe: plain TCP connect, independent of the S3 protocol.
    pub async fn check_connectivity(&self, timeout: Duration) -> Result<()> {
        let addr = self.socket_addr()?;
        match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(anyhow!("cannot connect to {}: {}", addr, e)),
            Err(_) => Err(anyhow!("connect to {} timed out after {:?}", addr, timeout)),
        }
    }
}

/// Built-in registry of local S3-compatible backends.
pub fn default_drivers() -> Vec<DriverConfig> {
    vec![
        DriverConfig::new("liteio", "http://localhost:9200", "liteio", "liteio123", "test-bucket"),
        DriverConfig::new("minio", "http://localhost:9000", "minioadmin", "minioadmin", "test-bucket"),
        DriverConfig::new("rustfs", "http://localhost:9100", "rustfsadmin", "rustfsadmin", "test-bucket"),
        DriverConfig::new("seaweedfs", "http://localhost:8333", "admin", "adminpassword", "test-bucket"),
        DriverConfig::new("localstack", "http://localhost:4566", "test", "test", "test-bucket"),
        DriverConfig::new("liteio_mem", "http://localhost:9201", "liteio", "liteio123", "test-bucket"),
    ]
}

/// Select drivers by name. An empty filter keeps every enabled driver.
/// Registry order is preserved either way.
pub fn filter_drivers(all: Vec<DriverConfig>, names: &[String]) -> Vec<DriverConfig> {
    if names.is_empty() {
        return all.into_iter().filter(|d| d.enabled).collect();
    }
    all.into_iter()
        .filter(|d| names.iter().any(|n| n.eq_ignore_ascii_case(&d.name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_filter_drivers() {
        let mut all = default_drivers();
        all[1].enabled = false;

        let enabled = filter_drivers(all.clone(), &[]);
        assert_eq!(enabled.len(), all.len() - 1);
        assert!(enabled.iter().all(|d| d.name != "minio"));

        // explicit selection ignores the enabled flag and keeps registry order
        let picked = filter_drivers(all, &["seaweedfs".to_string(), "MINIO".to_string()]);
        let names: Vec<_> = picked.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["minio", "seaweedfs"]);
    }

    #[test]
    fn test_socket_addr() {
        let d = DriverConfig::new("x", "http://localhost:9000", "a", "b", "c");
        assert_eq!(d.socket_addr().unwrap(), "localhost:9000");

        let d = DriverConfig::new("x", "https://s3.example.com", "a", "b", "c");
        assert_eq!(d.socket_addr().unwrap(), "s3.example.com:443");

        let d = DriverConfig::new("x", "not a url", "a", "b", "c");
        assert!(d.socket_addr().is_err());
    }

    #[test]
    fn test_credentials_not_serialized() {
        let d = DriverConfig::new("m", "http://h:1", "AKIAEXAMPLE", "TOPSECRET", "b");
        let json = serde_json::to_string(&d).unwrap();
        assert!(!json.contains("TOPSECRET"), "{}", json);
        assert!(!json.contains("AKIAEXAMPLE"), "{}", json);
        assert!(json.contains("\"endpoint\":\"http://h:1\""));
    }

    #[tokio::test]
    async fn test_check_connectivity() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let up = DriverConfig::new("up", format!("http://127.0.0.1:{}", port), "a", "b", "c");
        assert!(up.check_connectivity(Duration::from_secs(2)).await.is_ok());

        drop(listener);
        let down = DriverConfig::new("down", format!("http://127.0.0.1:{}", port), "a", "b", "c");
        assert!(down.check_connectivity(Duration::from_secs(2)).await.is_err());
    }
}
