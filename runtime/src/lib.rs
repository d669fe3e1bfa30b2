//! # Vendwatch Runtime
//!
//! The ingest pipeline: one long-lived task that subscribes to the stream
//! client and drives the analytics engine and inventory tracker, in arrival
//! order, one event at a time.
//!
//! ```text
//! ┌──────────────┐  ClientEvent   ┌────────────────┐
//! │ StreamClient │ ─────────────> │ IngestPipeline │
//! └──────────────┘                │   │ Sale        │
//!                                 │   ├─> AnalyticsEngine::ingest
//!                                 │   └─> InventoryTracker::record_sale
//!                                 │   GaveUp ─> logged, surfaced upward
//!                                 └────────────────┘
//! ```
//!
//! The pipeline applies analytics before inventory for every event, so the
//! event store append order always matches the stream delivery order, and
//! the tracker observes exactly the enriched events the engine accepted.
//! Per-event failures are absorbed and logged — a single bad frame never
//! stops the feed.

pub mod pipeline;

pub use pipeline::{IngestPipeline, PipelineReport};
