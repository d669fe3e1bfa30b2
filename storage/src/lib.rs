//! # Vendwatch Storage
//!
//! Durable, queryable local persistence for the Vendwatch event log and its
//! adjacent state blobs, transparently using the most capable available
//! backend.
//!
//! ## Backends
//!
//! - [`SledEventStore`] — indexed, transactional store: a timestamp-ordered
//!   primary tree, a product-name secondary index, and a state tree
//! - [`FlatFileStore`] — flat size-bounded JSON-file store, capped at
//!   roughly twice the feed-display limit, trimming oldest-first
//! - [`DurableEventStore`] — the composition the rest of the system uses:
//!   prefers sled, retries failed writes once on the fallback, degrades
//!   failed reads to empty results
//!
//! ## Example
//!
//! ```no_run
//! use vendwatch_storage::{DurableEventStore, EventQuery, EventStore, SortOrder};
//!
//! # async fn example() -> Result<(), vendwatch_storage::StoreError> {
//! let store = DurableEventStore::open("./data")?;
//!
//! let recent = store
//!     .query(EventQuery::new().sort(SortOrder::NewestFirst).limit(50))
//!     .await?;
//! println!("{} recent events", recent.len());
//! # Ok(())
//! # }
//! ```

pub mod durable;
pub mod flatfile;
pub mod indexed;
pub mod store;

pub use durable::DurableEventStore;
pub use flatfile::FlatFileStore;
pub use indexed::SledEventStore;
pub use store::{
    ANALYTICS_CACHE_PREFIX, EventFilter, EventQuery, EventStore, INVENTORY_KEY, SETTINGS_KEY,
    SortOrder, StateStore, StoreError,
};
