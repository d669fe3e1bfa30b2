//! The ingest pipeline task.

use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use vendwatch_analytics::AnalyticsEngine;
use vendwatch_inventory::InventoryTracker;
use vendwatch_stream::{ClientEvent, StreamClient};

/// What the pipeline did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Sales ingested through the engine and tracker.
    pub processed: u64,
    /// Events missed because the subscriber lagged the broadcast.
    pub lagged: u64,
    /// Whether the stream client exhausted its reconnection attempts.
    pub stream_gave_up: bool,
}

/// Drives validated sales from the stream client through the analytics
/// engine and the inventory tracker.
///
/// # Example
///
/// ```ignore
/// let (pipeline, shutdown) = IngestPipeline::new(&client, engine, tracker);
/// let handle = tokio::spawn(pipeline.run());
///
/// // ... later, on shutdown:
/// shutdown.send(true).ok();
/// let report = handle.await?;
/// ```
pub struct IngestPipeline {
    events: broadcast::Receiver<ClientEvent>,
    engine: Arc<AnalyticsEngine>,
    inventory: Arc<InventoryTracker>,
    shutdown: watch::Receiver<bool>,
}

impl IngestPipeline {
    /// Wire a pipeline to a stream client's event feed.
    ///
    /// Returns the pipeline and a shutdown sender; send `true` to stop the
    /// pipeline gracefully.
    #[must_use]
    pub fn new(
        client: &StreamClient,
        engine: Arc<AnalyticsEngine>,
        inventory: Arc<InventoryTracker>,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pipeline = Self {
            events: client.subscribe(),
            engine,
            inventory,
            shutdown: shutdown_rx,
        };
        (pipeline, shutdown_tx)
    }

    /// Process events until the feed closes or a shutdown signal arrives.
    ///
    /// Sales pass through the engine first (enrich, persist, invalidate,
    /// broadcast) and then the tracker, sequentially per event — one
    /// callback at a time, no reordering.
    pub async fn run(mut self) -> PipelineReport {
        tracing::info!("Ingest pipeline started");
        let mut report = PipelineReport::default();

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Ok(ClientEvent::Sale { sale, .. }) => {
                        let enriched = self.engine.ingest(sale).await;
                        self.inventory.record_sale(&enriched).await;
                        report.processed += 1;
                    }
                    Ok(ClientEvent::GaveUp { attempts }) => {
                        // Terminal for the stream session, not for the
                        // pipeline: consumers may prompt the user and
                        // reconnect the client.
                        tracing::error!(attempts, "Stream client gave up reconnecting");
                        report.stream_gave_up = true;
                    }
                    Ok(ClientEvent::StateChanged { previous, current }) => {
                        tracing::debug!(previous = %previous, current = %current, "Stream state change");
                    }
                    Ok(ClientEvent::Message { .. } | ClientEvent::Error(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Pipeline lagged the event feed");
                        report.lagged += missed;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        tracing::info!("Pipeline shutdown signal received");
                        break;
                    }
                }
            }
        }

        tracing::info!(processed = report.processed, "Ingest pipeline stopped");
        report
    }
}
