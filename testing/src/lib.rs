//! # Vendwatch Testing
//!
//! Testing utilities and helpers shared by the Vendwatch crates:
//!
//! - [`FixedClock`]: deterministic, manually-advanced time
//! - [`InMemoryEventStore`] / [`InMemoryStateStore`]: fast store mocks
//! - [`sale`]: fluent sale-event builder
//!
//! ## Example
//!
//! ```
//! use vendwatch_testing::{sale, test_clock};
//! use vendwatch_core::environment::Clock;
//!
//! let clock = test_clock();
//! let event = sale("Cola", 1.5).at(clock.now()).build();
//! assert_eq!(event.category, "beverages");
//! ```

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock as StdRwLock;
use vendwatch_core::SaleEvent;
use vendwatch_core::environment::Clock;
use vendwatch_core::payload::SalePayload;
use vendwatch_storage::{EventQuery, EventStore, StateStore, StoreError};

/// Deterministic clock for tests.
///
/// Starts at a fixed instant and only moves when told to, making period
/// windows, cache TTLs, and cooldowns reproducible.
///
/// # Example
///
/// ```
/// use vendwatch_testing::FixedClock;
/// use vendwatch_core::environment::Clock;
/// use chrono::{Duration, Utc};
///
/// let clock = FixedClock::new(Utc::now());
/// let before = clock.now();
/// clock.advance(Duration::minutes(31));
/// assert_eq!(clock.now() - before, Duration::minutes(31));
/// ```
#[derive(Debug)]
pub struct FixedClock {
    time: StdRwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock frozen at `time`.
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: StdRwLock::new(time),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.time.write().unwrap() += by;
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.time.write().unwrap() = to;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.read().unwrap()
    }
}

/// A default fixed clock for tests (2025-06-15 12:00:00 UTC, a Sunday).
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-06-15T12:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

/// Fluent builder for sale events in tests.
#[derive(Debug, Clone)]
pub struct SaleBuilder {
    name: String,
    price: f64,
    timestamp: Option<DateTime<Utc>>,
    id: Option<String>,
}

/// Start building a sale event.
///
/// # Example
///
/// ```
/// use vendwatch_testing::sale;
/// use chrono::Utc;
///
/// let event = sale("Chips", 2.0).at(Utc::now()).build();
/// assert_eq!(event.product_name, "Chips");
/// ```
#[must_use]
pub fn sale(name: &str, price: f64) -> SaleBuilder {
    SaleBuilder {
        name: name.to_string(),
        price,
        timestamp: None,
        id: None,
    }
}

impl SaleBuilder {
    /// Set the event timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set an explicit event id.
    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Build the enriched event. Events without an explicit timestamp use
    /// the epoch as receipt time, keeping builds deterministic.
    #[must_use]
    pub fn build(self) -> SaleEvent {
        let payload = SalePayload {
            id: self.id,
            product_name: self.name,
            price: self.price,
            timestamp: self.timestamp,
        };
        SaleEvent::from_payload(payload, DateTime::<Utc>::UNIX_EPOCH)
    }

    /// The wire-format JSON for this sale (what a stream source would send).
    #[must_use]
    pub fn to_wire(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "productName": self.name,
            "price": self.price,
        });
        if let Some(ts) = self.timestamp {
            value["timestamp"] = serde_json::json!(ts.timestamp_millis());
        }
        value
    }
}

/// In-memory event store for fast, deterministic testing.
///
/// Mirrors the semantics of the real backends (natural order oldest-first,
/// shared `EventQuery::apply` narrowing) without touching the filesystem.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: StdRwLock<Vec<SaleEvent>>,
}

impl InMemoryEventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored events, for assertions.
    #[must_use]
    pub fn events(&self) -> Vec<SaleEvent> {
        self.events.read().unwrap().clone()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        event: SaleEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.events.write().unwrap().push(event);
            Ok(())
        })
    }

    fn bulk_replace(
        &self,
        events: Vec<SaleEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            *self.events.write().unwrap() = events;
            Ok(())
        })
    }

    fn query(
        &self,
        query: EventQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SaleEvent>, StoreError>> + Send + '_>> {
        Box::pin(async move { Ok(query.apply(self.events.read().unwrap().clone())) })
    }

    fn count(&self) -> Pin<Box<dyn Future<Output = Result<usize, StoreError>> + Send + '_>> {
        Box::pin(async move { Ok(self.events.read().unwrap().len()) })
    }

    fn trim_oldest(
        &self,
        keep: usize,
    ) -> Pin<Box<dyn Future<Output = Result<usize, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut events = self.events.write().unwrap();
            let removed = events.len().saturating_sub(keep);
            events.drain(0..removed);
            Ok(removed)
        })
    }
}

/// In-memory state store for fast, deterministic testing.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    blobs: StdRwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently present, for assertions.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.blobs.read().unwrap().keys().cloned().collect()
    }
}

impl StateStore for InMemoryStateStore {
    fn save(
        &self,
        key: &str,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.blobs.write().unwrap().insert(key, data);
            Ok(())
        })
    }

    fn load(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.blobs.read().unwrap().get(&key).cloned()) })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.blobs.write().unwrap().remove(&key);
            Ok(())
        })
    }
}
