// tests/workload_tests.rs
//
// Read-load behaviour: concurrency bound, per-sample errors, live reporter
// lifetime and cancellation.

mod common;

use common::{mem_driver, recording_sink, MemoryClient};
use s3_read_bench::events::{BenchEvent, NoopSink};
use s3_read_bench::prepare::populate_category;
use s3_read_bench::workload::{run_read_load, ReadLoad};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SIZE: u64 = 1024;

async fn prepared(client: MemoryClient, samples: usize) -> Arc<MemoryClient> {
    let client = Arc::new(client);
    populate_category(
        &*client,
        &mem_driver("mem"),
        SIZE,
        samples,
        &NoopSink,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    client
}

fn load(threads: usize, samples: usize, report_interval: Duration) -> ReadLoad {
    ReadLoad {
        driver: "mem".to_string(),
        object_size: SIZE,
        threads,
        samples,
        report_interval,
    }
}

#[tokio::test]
async fn test_in_flight_reads_bounded_by_threads() {
    let client = prepared(MemoryClient::new().with_get_delay(Duration::from_millis(20)), 20).await;

    let outcome = run_read_load(
        &load(4, 20, Duration::from_millis(50)),
        client.clone(),
        Arc::new(NoopSink),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(!outcome.cancelled);
    assert_eq!(outcome.result.samples, 20);
    assert_eq!(outcome.result.errors, 0);
    assert_eq!(outcome.result.total_bytes, SIZE * 20);
    assert!(client.max_active() <= 4, "max in flight {}", client.max_active());
    assert!(client.max_active() > 1);
}

#[tokio::test]
async fn test_failed_reads_are_counted() {
    let client = prepared(MemoryClient::new().failing_gets(&[1, 3]), 10).await;

    let outcome = run_read_load(
        &load(2, 10, Duration::from_millis(50)),
        client,
        Arc::new(NoopSink),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let r = outcome.result;
    assert_eq!(r.samples, 10);
    assert_eq!(r.errors, 2);
    assert!(r.throughput > 0.0);
}

#[tokio::test]
async fn test_progress_reaches_total() {
    let client = prepared(MemoryClient::new(), 6).await;
    let (sink, events) = recording_sink();

    run_read_load(&load(3, 6, Duration::from_millis(50)), client, sink, &CancellationToken::new())
        .await
        .unwrap();

    let events = events.lock();
    let max_progress = events
        .iter()
        .filter_map(|e| match e {
            BenchEvent::Progress { current, total, .. } => Some((*current, *total)),
            _ => None,
        })
        .max();
    assert_eq!(max_progress, Some((6, 6)));
    let latency_samples = events
        .iter()
        .filter(|e| matches!(e, BenchEvent::LatencySample { .. }))
        .count();
    assert_eq!(latency_samples, 6);
}

fn throughput_events(events: &[BenchEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, BenchEvent::ThroughputSample { .. }))
        .count()
}

#[tokio::test]
async fn test_reporter_stops_with_load() {
    let client = prepared(MemoryClient::new().with_get_delay(Duration::from_millis(20)), 10).await;
    let (sink, events) = recording_sink();

    run_read_load(&load(2, 10, Duration::from_millis(10)), client, sink, &CancellationToken::new())
        .await
        .unwrap();

    let after_load = throughput_events(&events.lock());
    // periodic samples plus the final one
    assert!(after_load >= 2, "only {} throughput samples", after_load);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(throughput_events(&events.lock()), after_load);
}

#[tokio::test]
async fn test_cancelled_load_stops_dispatch() {
    let client = prepared(MemoryClient::new(), 5).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = run_read_load(&load(2, 5, Duration::from_millis(50)), client, Arc::new(NoopSink), &cancel)
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.result.samples, 0);
    assert_eq!(outcome.result.total_bytes, 0);
    assert_eq!(outcome.result.throughput, 0.0);
}

#[tokio::test]
async fn test_cancel_while_reads_in_flight() {
    let client = prepared(MemoryClient::new().with_get_delay(Duration::from_millis(30)), 20).await;
    let (sink, events) = recording_sink();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = run_read_load(&load(2, 20, Duration::from_millis(10)), client.clone(), sink, &cancel)
        .await
        .unwrap();

    assert!(outcome.cancelled);
    let dispatched = outcome.result.samples;
    assert!(dispatched > 0 && dispatched < 20, "dispatched {}", dispatched);
    assert_eq!(outcome.result.errors, 0);
    assert_eq!(outcome.result.total_bytes, SIZE * dispatched as u64);

    // every dispatched read finished before the load returned
    assert_eq!(client.active(), 0);
    let events = events.lock();
    let completed = events
        .iter()
        .filter(|e| matches!(e, BenchEvent::LatencySample { .. }))
        .count();
    assert_eq!(completed, dispatched);
    let last_progress = events
        .iter()
        .filter_map(|e| match e {
            BenchEvent::Progress { current, .. } => Some(*current),
            _ => None,
        })
        .max();
    assert_eq!(last_progress, Some(dispatched));
}

#[tokio::test]
async fn test_zero_report_interval_still_reports() {
    let client = prepared(MemoryClient::new().with_get_delay(Duration::from_millis(20)), 10).await;
    let (sink, events) = recording_sink();

    let outcome = run_read_load(&load(2, 10, Duration::ZERO), client, sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.result.samples, 10);
    // periodic samples in addition to the final one
    assert!(throughput_events(&events.lock()) >= 2);
}
