//! Storage client contract consumed by the benchmark core.
//!
//! The core never talks to a backend directly; it goes through an
//! [`ObjectClient`] obtained from a [`ClientFactory`]. The S3 implementation
//! lives in [`crate::s3_client`]; tests plug in an in-memory one.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::AsyncRead;

use crate::driver::DriverConfig;

/// Body of a GET, consumed incrementally so TTFB can be observed.
pub type ObjectStream = Box<dyn AsyncRead + Send + Unpin>;

/// Object operations against one driver's bucket.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Ensure the bucket is usable, creating it when absent.
    async fn check_available(&self) -> Result<()>;

    async fn put(&self, key: &str, body: Bytes) -> Result<()>;

    async fn get(&self, key: &str) -> Result<ObjectStream>;

    /// All keys starting with `prefix`, across pages.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Creates clients for drivers. Called once per phase and driver.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, driver: &DriverConfig) -> Result<Arc<dyn ObjectClient>>;
}
