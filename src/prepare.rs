//! SETUP phase: populate one size category on one driver.
//!
//! Every object of a (driver, size) category lives under a deterministic
//! prefix, so CLEANUP can remove exactly that category by listing it.

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::constants::{BYTES_PER_MIB, KEY_PREFIX};
use crate::driver::DriverConfig;
use crate::events::{BenchEvent, EventSink};
use crate::size_parser::{format_size, size_label};
use crate::store::ObjectClient;

/// Prefix shared by every object of one (driver, size) category.
pub fn category_prefix(driver: &str, size: u64) -> String {
    format!("{}-{}-{}/", KEY_PREFIX, driver, size_label(size))
}

/// Prefix shared by every object a driver ever receives from this tool.
pub fn driver_prefix(driver: &str) -> String {
    format!("{}-{}-", KEY_PREFIX, driver)
}

/// Key of the `index`-th object of a category. Stable for the lifetime of
/// the process: the hash input includes the process id.
pub fn object_key(driver: &str, size: u64, index: usize) -> String {
    let seed = format!("{}-{}-{}-{}", driver, size, index, std::process::id());
    let digest = Sha256::digest(seed.as_bytes());
    format!(
        "{}{}/{}",
        category_prefix(driver, size),
        index,
        hex::encode(&digest[..8])
    )
}

/// Upload statistics for one populated category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepareStats {
    pub objects: usize,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl PrepareStats {
    pub fn throughput_mbps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs / BYTES_PER_MIB
        } else {
            0.0
        }
    }
}

/// Random payload reused for every object of a category.
pub fn generate_payload(size: u64) -> Bytes {
    let mut data = vec![0u8; size as usize];
    rand::rng().fill_bytes(&mut data);
    Bytes::from(data)
}

/// Verify the bucket and upload exactly `samples` objects of `size` bytes.
///
/// Stops at the first failed upload; the caller decides what a failure
/// means for the driver. Cancellation is checked before every upload.
pub async fn populate_category(
    client: &dyn ObjectClient,
    driver: &DriverConfig,
    size: u64,
    samples: usize,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) -> Result<PrepareStats> {
    client
        .check_available()
        .await
        .context("bucket not available")?;

    info!(
        "[{}] Uploading {} x {} objects",
        driver.name,
        samples,
        format_size(size)
    );

    let data = generate_payload(size);
    let start = Instant::now();
    let mut uploaded: u64 = 0;

    for i in 0..samples {
        if cancel.is_cancelled() {
            return Err(anyhow!("setup cancelled after {} of {} uploads", i, samples));
        }

        let key = object_key(&driver.name, size, i);
        let op_start = Instant::now();
        client
            .put(&key, data.clone())
            .await
            .with_context(|| format!("upload object {}", key))?;
        uploaded += size;

        let elapsed = start.elapsed().as_secs_f64();
        let mbps = if elapsed > 0.0 {
            uploaded as f64 / elapsed / BYTES_PER_MIB
        } else {
            0.0
        };
        debug!("[{}] put {} in {:?}", driver.name, key, op_start.elapsed());

        sink.emit(BenchEvent::Progress {
            current: i + 1,
            total: samples,
            message: format!(
                "[{}] Uploading {} ({}/{}) - {:.1} MB/s - {:?}/obj",
                driver.name,
                format_size(size),
                i + 1,
                samples,
                mbps,
                op_start.elapsed()
            ),
        });
        sink.emit(BenchEvent::DriverProgress {
            driver: driver.name.clone(),
            completed: i + 1,
            total: samples,
            mbps,
        });
        sink.emit(BenchEvent::ThroughputSample {
            driver: driver.name.clone(),
            mbps,
            timestamp: chrono::Utc::now(),
        });
    }

    let stats = PrepareStats {
        objects: samples,
        bytes: uploaded,
        elapsed: start.elapsed(),
    };
    info!(
        "[{}] Uploaded {} x {} in {:?} ({:.1} MB/s avg)",
        driver.name,
        samples,
        format_size(size),
        stats.elapsed,
        stats.throughput_mbps()
    );
    Ok(stats)
}
