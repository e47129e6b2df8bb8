//! CLEANUP phase: delete benchmark objects by prefix.
//!
//! Deletion failures never abort a cleanup; each one is logged as a warning
//! and the remaining keys are still attempted.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::driver::DriverConfig;
use crate::events::{BenchEvent, EventSink};
use crate::prepare::{category_prefix, driver_prefix};
use crate::size_parser::format_size;
use crate::store::ObjectClient;

/// Counts from one prefix cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub listed: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Delete every object of one (driver, size) category.
pub async fn cleanup_category(
    client: &dyn ObjectClient,
    driver: &DriverConfig,
    size: u64,
    sink: &dyn EventSink,
) -> Result<CleanupStats> {
    let prefix = category_prefix(&driver.name, size);
    let stats = delete_prefix(client, &prefix, sink).await?;
    if stats.deleted > 0 {
        info!(
            "[{}] Deleted {} x {} objects",
            driver.name,
            stats.deleted,
            format_size(size)
        );
    }
    Ok(stats)
}

/// Delete every object this tool ever wrote for a driver, across all sizes.
pub async fn cleanup_driver(
    client: &dyn ObjectClient,
    driver: &DriverConfig,
    sink: &dyn EventSink,
) -> Result<CleanupStats> {
    info!("[{}] Deleting all test objects", driver.name);
    let stats = delete_prefix(client, &driver_prefix(&driver.name), sink).await?;
    info!("[{}] Deleted {} objects", driver.name, stats.deleted);
    Ok(stats)
}

async fn delete_prefix(
    client: &dyn ObjectClient,
    prefix: &str,
    sink: &dyn EventSink,
) -> Result<CleanupStats> {
    let keys = client
        .list_prefix(prefix)
        .await
        .with_context(|| format!("list objects under {}", prefix))?;

    let mut stats = CleanupStats {
        listed: keys.len(),
        ..Default::default()
    };
    for key in &keys {
        match client.delete(key).await {
            Ok(()) => stats.deleted += 1,
            Err(e) => {
                stats.failed += 1;
                let msg = format!("[WARN] Failed to delete {}: {:#}", key, e);
                warn!("{}", msg);
                sink.emit(BenchEvent::Log(msg));
            }
        }
    }
    Ok(stats)
}
