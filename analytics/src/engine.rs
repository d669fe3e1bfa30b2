//! The analytics engine: validated ingestion, cached snapshots, and
//! real-time counters.
//!
//! # Ownership
//!
//! The engine exclusively owns the in-memory working set (most-recent-first)
//! and the snapshot cache; the event store only ever sees append/query
//! traffic from here. Consumers observe ingestion through the `new-sale`
//! broadcast.
//!
//! # Cache Contract
//!
//! A snapshot is cached per [`Period`] behind an `Arc`: repeated
//! `snapshot()` calls without an intervening ingest return the *identical*
//! object. Any successful ingest clears the whole cache — a new event can
//! shift top-N rankings, histograms, and comparisons, so there is no
//! finer-grained invalidation. Entries also expire after a fixed TTL
//! (24 hours) even without ingest.

use crate::period::Period;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use vendwatch_core::environment::Clock;
use vendwatch_core::payload::{SalePayload, ValidationError, validate_sale};
use vendwatch_core::SaleEvent;
use vendwatch_storage::{
    ANALYTICS_CACHE_PREFIX, EventQuery, EventStore, SortOrder, StateStore, StoreError,
};

/// Snapshot cache lifetime; ingest invalidates sooner.
const CACHE_TTL_HOURS: i64 = 24;

/// Capacity of the `new-sale` broadcast channel.
const SALE_BUFFER: usize = 256;

/// Always-fresh counters over the rolling last hour / last 24 hours.
///
/// Computed directly from the working set on every call, never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct RealTimeStats {
    /// All-time sale count in the working set.
    pub total_sales: u64,
    /// Sales in the rolling last 24 hours.
    pub sales_last_24h: u64,
    /// Sales in the rolling last hour.
    pub sales_last_hour: u64,
    /// All-time revenue in the working set.
    pub total_revenue: f64,
    /// Revenue in the rolling last 24 hours.
    pub revenue_last_24h: f64,
    /// Timestamp of the most recent sale, if any.
    pub last_sale_time: Option<DateTime<Utc>>,
    /// True iff at least one sale occurred in the rolling last hour.
    pub is_active: bool,
}

struct CacheEntry {
    snapshot: Arc<Snapshot>,
    computed_at: DateTime<Utc>,
}

/// Long-lived analytics service over the event log.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use vendwatch_analytics::{AnalyticsEngine, Period};
/// use vendwatch_core::environment::SystemClock;
/// use vendwatch_storage::DurableEventStore;
///
/// # async fn example() -> Result<(), vendwatch_storage::StoreError> {
/// let store = Arc::new(DurableEventStore::open("./data")?);
/// let engine = AnalyticsEngine::new(store.clone(), Arc::new(SystemClock))
///     .with_state_store(store.state());
/// engine.load().await?;
///
/// let snapshot = engine.snapshot(Period::Today, true).await;
/// println!("{} sales today", snapshot.total_sales);
/// # Ok(())
/// # }
/// ```
pub struct AnalyticsEngine {
    store: Arc<dyn EventStore>,
    state: Option<Arc<dyn StateStore>>,
    clock: Arc<dyn Clock>,
    working_set: RwLock<Vec<SaleEvent>>,
    cache: RwLock<HashMap<Period, CacheEntry>>,
    sales: broadcast::Sender<SaleEvent>,
    cache_ttl: Duration,
}

impl AnalyticsEngine {
    /// Create an engine over `store`, reading time through `clock`.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        let (sales, _) = broadcast::channel(SALE_BUFFER);
        Self {
            store,
            state: None,
            clock,
            working_set: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
            sales,
            cache_ttl: Duration::hours(CACHE_TTL_HOURS),
        }
    }

    /// Persist computed snapshots to (and restore them from) a state store
    /// under the `analytics-cache/<period>` keys.
    #[must_use]
    pub fn with_state_store(mut self, state: Arc<dyn StateStore>) -> Self {
        self.state = Some(state);
        self
    }

    /// Override the snapshot cache TTL.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Subscribe to the `new-sale` notification.
    #[must_use]
    pub fn subscribe_sales(&self) -> broadcast::Receiver<SaleEvent> {
        self.sales.subscribe()
    }

    /// Bulk-load the working set from the store and restore unexpired
    /// persisted snapshots. Call once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the initial query fails outright (the
    /// durable store composition degrades most read failures to empty
    /// results before that happens).
    pub async fn load(&self) -> Result<usize, StoreError> {
        let events = self
            .store
            .query(EventQuery::new().sort(SortOrder::NewestFirst))
            .await?;
        let count = events.len();
        *self.working_set.write().await = events;

        if let Some(state) = &self.state {
            let now = self.clock.now();
            let mut cache = self.cache.write().await;
            for period in Period::ALL_PERIODS {
                let key = format!("{ANALYTICS_CACHE_PREFIX}{period}");
                match state.load(&key).await {
                    Ok(Some(bytes)) => match bincode::deserialize::<Snapshot>(&bytes) {
                        Ok(snapshot) if now - snapshot.computed_at < self.cache_ttl => {
                            cache.insert(
                                period,
                                CacheEntry {
                                    computed_at: snapshot.computed_at,
                                    snapshot: Arc::new(snapshot),
                                },
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, period = %period, "Discarding corrupt cached snapshot");
                        }
                    },
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, period = %period, "Failed to read cached snapshot");
                    }
                }
            }
        }

        tracing::info!(events = count, "Analytics working set loaded");
        Ok(count)
    }

    /// Validate and ingest one raw event.
    ///
    /// On success the event is enriched, prepended to the working set,
    /// persisted best-effort, every cached snapshot is invalidated, and the
    /// `new-sale` notification fires. Rejection leaves all state untouched.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] for payloads failing sale validation.
    pub async fn add_event(&self, raw: &Value) -> Result<SaleEvent, ValidationError> {
        let payload = validate_sale(raw)?;
        Ok(self.ingest(payload).await)
    }

    /// Ingest an already-validated payload (the stream pipeline path; the
    /// type guarantees it passed the same validation `add_event` applies).
    pub async fn ingest(&self, payload: SalePayload) -> SaleEvent {
        let event = SaleEvent::from_payload(payload, self.clock.now());

        // Working set first (synchronously), durable write second: a crash
        // between the two loses only the durable copy, which the feed's
        // best-effort contract allows.
        self.working_set.write().await.insert(0, event.clone());

        if let Err(e) = self.store.append(event.clone()).await {
            tracing::warn!(error = %e, event_id = %event.id, "Event persisted nowhere, continuing");
        }

        self.invalidate_cache().await;

        metrics::counter!("vendwatch_analytics_ingested_total").increment(1);
        let _ = self.sales.send(event.clone());
        event
    }

    /// Get the snapshot for `period`.
    ///
    /// Returns the cached snapshot unchanged while it is live and
    /// `use_cache` is true; otherwise filters the working set to the
    /// period's window, computes, caches, and returns a fresh one.
    pub async fn snapshot(&self, period: Period, use_cache: bool) -> Arc<Snapshot> {
        let now = self.clock.now();

        if use_cache {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&period) {
                if now - entry.computed_at < self.cache_ttl {
                    metrics::counter!("vendwatch_analytics_cache_hits_total").increment(1);
                    return Arc::clone(&entry.snapshot);
                }
            }
        }

        let snapshot = {
            let working_set = self.working_set.read().await;
            let current: Vec<SaleEvent> = match period.window_start(now) {
                Some(start) => working_set
                    .iter()
                    .filter(|e| e.timestamp >= start && e.timestamp <= now)
                    .cloned()
                    .collect(),
                None => working_set.clone(),
            };
            let previous: Vec<SaleEvent> = match period.previous_window(now) {
                Some((start, end)) => working_set
                    .iter()
                    .filter(|e| e.timestamp >= start && e.timestamp < end)
                    .cloned()
                    .collect(),
                None => Vec::new(),
            };
            Arc::new(Snapshot::compute(period, &current, &previous, now))
        };

        metrics::counter!("vendwatch_analytics_cache_misses_total").increment(1);
        self.cache.write().await.insert(
            period,
            CacheEntry {
                snapshot: Arc::clone(&snapshot),
                computed_at: now,
            },
        );
        self.persist_snapshot(period, &snapshot).await;

        snapshot
    }

    /// Always-fresh rolling counters, computed straight off the working set.
    pub async fn real_time_stats(&self) -> RealTimeStats {
        let now = self.clock.now();
        let hour_ago = now - Duration::hours(1);
        let day_ago = now - Duration::hours(24);

        let working_set = self.working_set.read().await;
        let mut stats = RealTimeStats {
            total_sales: working_set.len() as u64,
            sales_last_24h: 0,
            sales_last_hour: 0,
            total_revenue: 0.0,
            revenue_last_24h: 0.0,
            last_sale_time: working_set.first().map(|e| e.timestamp),
            is_active: false,
        };

        for event in working_set.iter() {
            stats.total_revenue += event.price;
            if event.timestamp >= day_ago {
                stats.sales_last_24h += 1;
                stats.revenue_last_24h += event.price;
            }
            if event.timestamp >= hour_ago {
                stats.sales_last_hour += 1;
            }
        }
        stats.is_active = stats.sales_last_hour > 0;
        stats
    }

    /// Query the stored event log (feed population, export).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying store query fails.
    pub async fn query_events(&self, query: EventQuery) -> Result<Vec<SaleEvent>, StoreError> {
        self.store.query(query).await
    }

    /// Replace the entire event set (import/restore), resetting the working
    /// set and invalidating every cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the durable replace fails.
    pub async fn replace_events(&self, mut events: Vec<SaleEvent>) -> Result<(), StoreError> {
        self.store.bulk_replace(events.clone()).await?;
        events.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        *self.working_set.write().await = events;
        self.invalidate_cache().await;
        Ok(())
    }

    /// Number of events in the working set.
    pub async fn working_set_len(&self) -> usize {
        self.working_set.read().await.len()
    }

    async fn invalidate_cache(&self) {
        self.cache.write().await.clear();
        if let Some(state) = &self.state {
            for period in Period::ALL_PERIODS {
                let key = format!("{ANALYTICS_CACHE_PREFIX}{period}");
                if let Err(e) = state.delete(&key).await {
                    tracing::debug!(error = %e, period = %period, "Cached snapshot delete failed");
                }
            }
        }
    }

    async fn persist_snapshot(&self, period: Period, snapshot: &Snapshot) {
        let Some(state) = &self.state else { return };
        match bincode::serialize(snapshot) {
            Ok(bytes) => {
                let key = format!("{ANALYTICS_CACHE_PREFIX}{period}");
                if let Err(e) = state.save(&key, bytes).await {
                    tracing::debug!(error = %e, period = %period, "Snapshot persist failed");
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, period = %period, "Snapshot serialize failed");
            }
        }
    }
}
