//! End-to-end pipeline test: WebSocket feed → stream client → analytics →
//! inventory.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Integration tests can use unwrap/expect

use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use vendwatch_analytics::{AnalyticsEngine, Period};
use vendwatch_core::environment::SystemClock;
use vendwatch_inventory::{InventoryTracker, NewProduct};
use vendwatch_runtime::IngestPipeline;
use vendwatch_stream::{StreamClient, StreamConfig};
use vendwatch_testing::{InMemoryEventStore, InMemoryStateStore};

const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test]
async fn feed_flows_through_analytics_and_inventory() {
    init_tracing();
    // A server that sends three frames: two sales and one malformed payload.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"productName":"Cola","price":"$1.50"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"productName":"","price":9}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"productName":"Chips","price":2.0}"#.into()))
                .await
                .unwrap();
            while ws.next().await.is_some() {}
        }
    });

    let clock = Arc::new(SystemClock);
    let engine = Arc::new(AnalyticsEngine::new(
        Arc::new(InMemoryEventStore::new()),
        clock.clone(),
    ));
    let tracker = Arc::new(InventoryTracker::new(
        Arc::new(InMemoryStateStore::new()),
        clock,
    ));
    tracker
        .add_product(NewProduct::new("Cola", 10, 1.5))
        .await
        .unwrap();

    let client = StreamClient::new(StreamConfig::new(format!("ws://{addr}")));
    let (pipeline, shutdown) = IngestPipeline::new(&client, engine.clone(), tracker.clone());
    let handle = tokio::spawn(pipeline.run());
    client.connect().await;

    // Wait until both valid sales made it through.
    timeout(WAIT, async {
        while engine.working_set_len().await < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("sales not ingested in time");

    let snapshot = engine.snapshot(Period::All, true).await;
    assert_eq!(snapshot.total_sales, 2, "malformed frame must be dropped");
    assert!((snapshot.total_revenue - 3.5).abs() < f64::EPSILON);

    // Cola matched the tracked record; Chips was auto-created at stock 0.
    let records = tracker.list().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "Cola");
    assert_eq!(records[0].current_stock, 9);
    assert_eq!(records[1].name, "Chips");
    assert_eq!(records[1].current_stock, 0);

    client.disconnect().await;
    shutdown.send(true).ok();
    let report = timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(report.processed, 2);
    assert!(!report.stream_gave_up);
}

#[tokio::test]
async fn pipeline_surfaces_stream_give_up() {
    init_tracing();
    // Point the client at a dead port with a tiny retry budget.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let policy = vendwatch_stream::ReconnectPolicy::builder()
        .base_delay(Duration::from_millis(5))
        .max_jitter(Duration::from_millis(1))
        .max_attempts(1)
        .build();
    let client = StreamClient::new(StreamConfig::new(format!("ws://{addr}")).with_policy(policy));

    let clock = Arc::new(SystemClock);
    let engine = Arc::new(AnalyticsEngine::new(
        Arc::new(InMemoryEventStore::new()),
        clock.clone(),
    ));
    let tracker = Arc::new(InventoryTracker::new(
        Arc::new(InMemoryStateStore::new()),
        clock,
    ));

    let (pipeline, shutdown) = IngestPipeline::new(&client, engine, tracker);
    let handle = tokio::spawn(pipeline.run());
    client.connect().await;

    // Give the client time to exhaust its attempts, then stop the pipeline.
    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown.send(true).ok();

    let report = timeout(WAIT, handle).await.unwrap().unwrap();
    assert!(report.stream_gave_up);
    assert_eq!(report.processed, 0);
}
