//! Event store and state store traits.
//!
//! The event store is a durable append-only log of [`SaleEvent`]s with
//! filtered/sorted/limited querying. The state store holds small namespaced
//! blobs (the settings document, the inventory collection, the persisted
//! analytics cache) next to the log.
//!
//! # Design
//!
//! Both traits are deliberately minimal. The event store does NOT provide:
//!
//! - Update or delete of individual events (events are immutable facts)
//! - Aggregation (that is the analytics engine's job)
//! - Subscriptions (the `new-sale` broadcast lives in the engine)
//!
//! # Dyn Compatibility
//!
//! Both traits use explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` to enable trait object usage (`Arc<dyn EventStore>`), the same
//! trade-off the rest of the workspace makes for injected dependencies.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use vendwatch_core::SaleEvent;

/// Errors that can occur during storage operations.
///
/// Storage failures are always recoverable from the caller's point of view:
/// writes degrade to the fallback backend and reads degrade to empty
/// results. No storage error ever crosses into the stream-processing path.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Backend operation failed (corrupt tree, unavailable database, ...).
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Event or blob could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The backend is out of space; old events should be trimmed.
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Predicate used to narrow a query to matching events.
pub type EventFilter = Arc<dyn Fn(&SaleEvent) -> bool + Send + Sync>;

/// Sort order for query results, by event timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Most recent events first (feed population).
    NewestFirst,
    /// Oldest events first (replay, export).
    OldestFirst,
}

/// A filtered/sorted/limited query over the event log.
///
/// # Example
///
/// ```
/// use vendwatch_storage::{EventQuery, SortOrder};
///
/// let recent_beverages = EventQuery::new()
///     .filter(|e| e.category == "beverages")
///     .sort(SortOrder::NewestFirst)
///     .limit(50);
/// ```
#[derive(Clone, Default)]
pub struct EventQuery {
    /// Optional predicate; `None` matches everything.
    pub filter: Option<EventFilter>,
    /// Narrow to one product name (served by the product index where the
    /// backend has one). Matching is case-insensitive on the exact name.
    pub product: Option<String>,
    /// Optional ordering; `None` keeps the backend's natural (oldest-first)
    /// order.
    pub sort: Option<SortOrder>,
    /// Optional result cap, applied after filtering and sorting.
    pub limit: Option<usize>,
}

impl EventQuery {
    /// Create an empty query matching all events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Narrow results with a predicate.
    #[must_use]
    pub fn filter(mut self, f: impl Fn(&SaleEvent) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(f));
        self
    }

    /// Narrow results to one product name (case-insensitive).
    #[must_use]
    pub fn for_product(mut self, name: impl Into<String>) -> Self {
        self.product = Some(name.into());
        self
    }

    /// Order results by timestamp.
    #[must_use]
    pub fn sort(mut self, order: SortOrder) -> Self {
        self.sort = Some(order);
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Apply filter, sort, and limit to an already-materialized sequence.
    ///
    /// Backends share this so filter/sort/limit semantics never drift
    /// between them; an indexed backend may pre-narrow by product before
    /// calling it.
    #[must_use]
    pub fn apply(&self, events: Vec<SaleEvent>) -> Vec<SaleEvent> {
        let mut out: Vec<SaleEvent> = match (&self.product, &self.filter) {
            (None, None) => events,
            (product, filter) => events
                .into_iter()
                .filter(|e| {
                    product.as_ref().is_none_or(|p| e.product_name.eq_ignore_ascii_case(p))
                        && filter.as_ref().is_none_or(|f| f.as_ref()(e))
                })
                .collect(),
        };

        match self.sort {
            Some(SortOrder::NewestFirst) => out.sort_by_key(|e| std::cmp::Reverse(e.timestamp)),
            Some(SortOrder::OldestFirst) => out.sort_by_key(|e| e.timestamp),
            None => {}
        }

        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

impl std::fmt::Debug for EventQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQuery")
            .field("filter", &self.filter.as_ref().map(|_| "<predicate>"))
            .field("product", &self.product)
            .field("sort", &self.sort)
            .field("limit", &self.limit)
            .finish()
    }
}

/// Durable, queryable persistence for the event log.
///
/// # Failure Contract
///
/// - `append` reports failure but the caller's in-memory state is already
///   updated; the event is lost, not requeued (best-effort feed)
/// - `query`/`count` failures at composition level degrade to empty results
/// - no operation ever panics across the boundary
pub trait EventStore: Send + Sync {
    /// Append one event to the log.
    ///
    /// The event already carries its id and normalized timestamp (assigned
    /// at enrichment).
    fn append(
        &self,
        event: SaleEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Atomically replace the entire stored set (import/restore).
    fn bulk_replace(
        &self,
        events: Vec<SaleEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Return events narrowed/ordered/capped by `query`.
    fn query(
        &self,
        query: EventQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SaleEvent>, StoreError>> + Send + '_>>;

    /// Number of stored events.
    fn count(&self) -> Pin<Box<dyn Future<Output = Result<usize, StoreError>> + Send + '_>>;

    /// Drop the oldest events until at most `keep` remain.
    ///
    /// Used for quota-pressure trimming and retention aging.
    fn trim_oldest(
        &self,
        keep: usize,
    ) -> Pin<Box<dyn Future<Output = Result<usize, StoreError>> + Send + '_>>;
}

/// Small namespaced blob storage next to the event log.
///
/// Holds the settings document, the serialized inventory collection, and
/// the persisted analytics cache, each under a distinct key
/// (`"settings"`, `"inventory"`, `"analytics-cache/<period>"`).
pub trait StateStore: Send + Sync {
    /// Save a blob under `key` (upsert).
    fn save(
        &self,
        key: &str,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Load the blob stored under `key`, if any.
    fn load(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send + '_>>;

    /// Delete the blob stored under `key`. Missing keys are not an error.
    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}

/// State key for the settings blob.
pub const SETTINGS_KEY: &str = "settings";
/// State key for the inventory collection.
pub const INVENTORY_KEY: &str = "inventory";
/// State key prefix for persisted analytics snapshots.
pub const ANALYTICS_CACHE_PREFIX: &str = "analytics-cache/";
