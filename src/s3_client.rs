//! S3 adapter built on the AWS SDK.
//!
//! Every backend in the registry speaks the S3 API, so one implementation
//! covers them all: static credentials, an explicit endpoint and path-style
//! addressing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3 as s3;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};

use crate::driver::DriverConfig;
use crate::store::{ClientFactory, ObjectClient, ObjectStream};

/// Factory handing out SDK-backed clients.
#[derive(Debug, Default, Clone)]
pub struct S3ClientFactory;

#[async_trait]
impl ClientFactory for S3ClientFactory {
    async fn connect(&self, driver: &DriverConfig) -> Result<Arc<dyn ObjectClient>> {
        Ok(Arc::new(S3ObjectClient::new(driver)) as Arc<dyn ObjectClient>)
    }
}

/// Client bound to one driver's bucket.
#[derive(Debug, Clone)]
pub struct S3ObjectClient {
    client: s3::Client,
    bucket: String,
}

impl S3ObjectClient {
    pub fn new(driver: &DriverConfig) -> Self {
        let creds = Credentials::new(
            driver.access_key.clone(),
            driver.secret_key.clone(),
            None,
            None,
            "s3-read-bench",
        );
        let conf = s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(driver.region.clone()))
            .endpoint_url(driver.endpoint.clone())
            .credentials_provider(creds)
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(conf),
            bucket: driver.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectClient for S3ObjectClient {
    async fn check_available(&self) -> Result<()> {
        if self.client.head_bucket().bucket(&self.bucket).send().await.is_ok() {
            return Ok(());
        }

        info!("Bucket {} not found, creating it", self.bucket);
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .with_context(|| format!("create bucket {}", self.bucket))?;
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .with_context(|| format!("head bucket {}", self.bucket))?;
        Ok(())
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<()> {
        let len = body.len() as i64;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(len)
            .content_type("application/octet-stream")
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("put {}", key))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ObjectStream> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("get {}", key))?;
        Ok(Box::new(Box::pin(resp.body.into_async_read())) as ObjectStream)
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut cont: Option<String> = None;
        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
            if let Some(c) = cont.as_deref() {
                req = req.continuation_token(c);
            }
            let resp = req
                .send()
                .await
                .with_context(|| format!("list {}", prefix))?;
            for obj in resp.contents() {
                if let Some(k) = obj.key() {
                    out.push(k.to_string());
                }
            }
            match resp.next_continuation_token() {
                Some(tok) if !tok.is_empty() => cont = Some(tok.to_string()),
                _ => break,
            }
        }
        debug!("Listed {} keys under {}", out.len(), prefix);
        Ok(out)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("delete {}", key))?;
        Ok(())
    }
}
