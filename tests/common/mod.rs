// tests/common/mod.rs
//
// In-memory object store shared by the integration tests.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use s3_read_bench::driver::DriverConfig;
use s3_read_bench::events::{BenchEvent, EventSink};
use s3_read_bench::store::{ClientFactory, ObjectClient, ObjectStream};

#[derive(Default)]
pub struct MemoryClient {
    objects: Mutex<BTreeMap<String, Bytes>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    puts: AtomicUsize,
    get_delay: Duration,
    fail_puts_after: Option<usize>,
    fail_get_indices: Vec<usize>,
    fail_delete_indices: Vec<usize>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each GET holds a slot for `delay` before returning its body.
    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = delay;
        self
    }

    /// PUTs succeed `n` times, then fail forever.
    pub fn failing_puts_after(mut self, n: usize) -> Self {
        self.fail_puts_after = Some(n);
        self
    }

    /// GETs of objects with these category indices fail.
    pub fn failing_gets(mut self, indices: &[usize]) -> Self {
        self.fail_get_indices = indices.to_vec();
        self
    }

    /// DELETEs of objects with these category indices fail.
    pub fn failing_deletes(mut self, indices: &[usize]) -> Self {
        self.fail_delete_indices = indices.to_vec();
        self
    }

    pub fn insert(&self, key: &str, body: &[u8]) {
        self.objects
            .lock()
            .insert(key.to_string(), Bytes::copy_from_slice(body));
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// GETs currently between request and response.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

fn key_index(key: &str) -> Option<usize> {
    key.split('/').nth(1)?.parse().ok()
}

#[async_trait]
impl ObjectClient for MemoryClient {
    async fn check_available(&self) -> Result<()> {
        Ok(())
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<()> {
        let n = self.puts.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_puts_after {
            if n >= limit {
                bail!("injected put failure for {}", key);
            }
        }
        self.objects.lock().insert(key.to_string(), body);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ObjectStream> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.get_delay.is_zero() {
            tokio::time::sleep(self.get_delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if key_index(key).is_some_and(|i| self.fail_get_indices.contains(&i)) {
            bail!("injected get failure for {}", key);
        }
        let body = self
            .objects
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("no such key: {}", key))?;
        Ok(Box::new(Cursor::new(body)) as ObjectStream)
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if key_index(key).is_some_and(|i| self.fail_delete_indices.contains(&i)) {
            bail!("injected delete failure for {}", key);
        }
        self.objects.lock().remove(key);
        Ok(())
    }
}

/// Hands out one shared [`MemoryClient`] per driver name.
#[derive(Default)]
pub struct MemoryFactory {
    clients: HashMap<String, Arc<MemoryClient>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, driver: &str, client: MemoryClient) -> Self {
        self.clients.insert(driver.to_string(), Arc::new(client));
        self
    }

    pub fn client(&self, driver: &str) -> Arc<MemoryClient> {
        self.clients[driver].clone()
    }
}

#[async_trait]
impl ClientFactory for MemoryFactory {
    async fn connect(&self, driver: &DriverConfig) -> Result<Arc<dyn ObjectClient>> {
        let client = self
            .clients
            .get(&driver.name)
            .ok_or_else(|| anyhow!("unknown driver {}", driver.name))?;
        Ok(client.clone() as Arc<dyn ObjectClient>)
    }
}

pub fn mem_driver(name: &str) -> DriverConfig {
    DriverConfig::new(name, "http://127.0.0.1:1", "key", "secret", "bench")
}

/// Sink that records every event for later inspection.
pub fn recording_sink() -> (Arc<dyn EventSink>, Arc<Mutex<Vec<BenchEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let sink: Arc<dyn EventSink> = Arc::new(move |event: BenchEvent| captured.lock().push(event));
    (sink, events)
}
