//! # Vendwatch Analytics
//!
//! The incremental analytics engine of the Vendwatch core: it turns the raw
//! event log into actionable aggregates with a clear recomputation trigger
//! and a bounded staleness window.
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐   validated sale   ┌──────────────────┐
//! │ Stream Client│ ─────────────────> │ AnalyticsEngine  │
//! └──────────────┘                    │  enrich          │
//!                                     │  working set ◄───┼── most-recent-first
//!                                     │  append ─────────┼──> Event Store
//!                                     │  invalidate cache│
//!                                     │  broadcast ──────┼──> "new-sale"
//!                                     └────────┬─────────┘
//!                                              │ snapshot(period)
//!                                              ▼
//!                                     ┌──────────────────┐
//!                                     │ Arc<Snapshot>    │  cached per period,
//!                                     │ (TTL 24h)        │  cleared on ingest
//!                                     └──────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - A snapshot is a pure function of `(event set, period)`; cache hits
//!   return the identical `Arc`
//! - Any successful ingest invalidates every cached snapshot
//! - Real-time counters are always computed fresh
//! - Validation rejections leave all state untouched

pub mod engine;
pub mod insights;
pub mod period;
pub mod series;
pub mod snapshot;

pub use engine::{AnalyticsEngine, RealTimeStats};
pub use period::Period;
pub use series::SeriesBucket;
pub use snapshot::{CategoryStat, PeriodComparison, ProductStat, Snapshot};
