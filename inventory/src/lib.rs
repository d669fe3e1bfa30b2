//! # Vendwatch Inventory
//!
//! Reactive inventory tracking for the Vendwatch core.
//!
//! Sale events decrement per-product stock (clamped at zero, never
//! negative); restocks and manual edits set it. Threshold crossings surface
//! as [`StockAlert`]s, rate-limited to one per record per cooldown window,
//! with out-of-stock outranking low-stock.
//!
//! Records are matched to free-form event product names with an explicit
//! two-phase fuzzy lookup (exact case-insensitive, then substring in either
//! direction), and unmatched sales can auto-create a record with stock
//! assumed zero.

pub mod record;
pub mod tracker;

pub use record::{
    DEFAULT_MIN_STOCK, InventoryError, InventoryRecord, NewProduct, StockChangeReason, StockLevel,
};
pub use tracker::{InventoryStats, InventoryTracker, StockAlert};
