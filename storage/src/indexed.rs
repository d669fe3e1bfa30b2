//! Indexed, transactional event store backed by sled.
//!
//! This is the preferred backend when a local database directory is
//! available. Layout:
//!
//! - `sales` — primary tree, keyed `{epoch_ms:020}/{id}` so a plain scan is
//!   already the timestamp index
//! - `sales_by_product` — secondary index, keyed
//!   `{lowercased name}/{epoch_ms:020}/{id}`, value = primary key
//! - `state` — the [`StateStore`] tree (settings blob, inventory
//!   collection, persisted analytics cache)
//!
//! Appends insert into both sales trees in one sled transaction. The tree
//! has no size cap; deployments are expected to age out events beyond their
//! retention window via [`SledEventStore::trim_oldest`].

use crate::store::{EventQuery, EventStore, StateStore, StoreError};
use sled::Transactional;
use sled::transaction::TransactionError;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use vendwatch_core::SaleEvent;

/// A persistent, indexed event store using sled trees.
#[derive(Clone)]
pub struct SledEventStore {
    sales: sled::Tree,
    by_product: sled::Tree,
    state: sled::Tree,
}

impl SledEventStore {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the database or one of its
    /// trees cannot be opened — the caller falls back to the flat-file
    /// backend in that case.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::Backend(e.to_string()))?;
        Self::with_db(&db)
    }

    /// Open the three logical trees on an existing database handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when a tree cannot be opened.
    pub fn with_db(db: &sled::Db) -> Result<Self, StoreError> {
        let open = |name: &str| {
            db.open_tree(name)
                .map_err(|e| StoreError::Backend(e.to_string()))
        };
        Ok(Self {
            sales: open("sales")?,
            by_product: open("sales_by_product")?,
            state: open("state")?,
        })
    }

    fn primary_key(event: &SaleEvent) -> String {
        format!("{:020}/{}", event.timestamp_ms().max(0), event.id)
    }

    fn product_key(event: &SaleEvent) -> String {
        format!(
            "{}/{:020}/{}",
            event.product_name.to_lowercase(),
            event.timestamp_ms().max(0),
            event.id
        )
    }

    fn decode(bytes: &[u8]) -> Result<SaleEvent, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn insert_pair(&self, event: &SaleEvent) -> Result<(), StoreError> {
        let value = serde_json::to_vec(event).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let primary = Self::primary_key(event);
        let index = Self::product_key(event);

        (&self.sales, &self.by_product)
            .transaction(|(sales, by_product)| {
                sales.insert(primary.as_bytes(), value.as_slice())?;
                by_product.insert(index.as_bytes(), primary.as_bytes())?;
                Ok(())
            })
            .map_err(|e: TransactionError| StoreError::Backend(e.to_string()))
    }

    /// Scan the primary tree oldest-first.
    fn scan_all(&self) -> Result<Vec<SaleEvent>, StoreError> {
        self.sales
            .iter()
            .map(|res| {
                let (_, value) = res.map_err(|e| StoreError::Backend(e.to_string()))?;
                Self::decode(&value)
            })
            .collect()
    }

    /// Scan one product via the secondary index, oldest-first.
    fn scan_product(&self, name: &str) -> Result<Vec<SaleEvent>, StoreError> {
        let prefix = format!("{}/", name.to_lowercase());
        self.by_product
            .scan_prefix(prefix.as_bytes())
            .map(|res| {
                let (_, primary) = res.map_err(|e| StoreError::Backend(e.to_string()))?;
                let value = self
                    .sales
                    .get(&primary)
                    .map_err(|e| StoreError::Backend(e.to_string()))?
                    .ok_or_else(|| StoreError::Backend("dangling product index entry".into()))?;
                Self::decode(&value)
            })
            .collect()
    }

    fn remove_pair(&self, event: &SaleEvent) -> Result<(), StoreError> {
        self.sales
            .remove(Self::primary_key(event).as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.by_product
            .remove(Self::product_key(event).as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

impl EventStore for SledEventStore {
    fn append(
        &self,
        event: SaleEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move { self.insert_pair(&event) })
    }

    fn bulk_replace(
        &self,
        events: Vec<SaleEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.sales
                .clear()
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            self.by_product
                .clear()
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            for event in &events {
                self.insert_pair(event)?;
            }
            Ok(())
        })
    }

    fn query(
        &self,
        query: EventQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SaleEvent>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            // Pre-narrow through the secondary index when the query names a
            // product; `apply` re-checks, so index and predicate semantics
            // cannot drift.
            let events = match &query.product {
                Some(name) => self.scan_product(name)?,
                None => self.scan_all()?,
            };
            Ok(query.apply(events))
        })
    }

    fn count(&self) -> Pin<Box<dyn Future<Output = Result<usize, StoreError>> + Send + '_>> {
        Box::pin(async move { Ok(self.sales.len()) })
    }

    fn trim_oldest(
        &self,
        keep: usize,
    ) -> Pin<Box<dyn Future<Output = Result<usize, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let total = self.sales.len();
            if total <= keep {
                return Ok(0);
            }
            let excess = total - keep;
            let oldest: Vec<SaleEvent> = self
                .scan_all()?
                .into_iter()
                .take(excess)
                .collect();
            for event in &oldest {
                self.remove_pair(event)?;
            }
            tracing::info!(removed = oldest.len(), keep, "Trimmed oldest events");
            Ok(oldest.len())
        })
    }
}

impl StateStore for SledEventStore {
    fn save(
        &self,
        key: &str,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.state
                .insert(key.as_bytes(), data)
                .map(|_| ())
                .map_err(|e| StoreError::Backend(e.to_string()))
        })
    }

    fn load(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.state
                .get(key.as_bytes())
                .map(|opt| opt.map(|ivec| ivec.to_vec()))
                .map_err(|e| StoreError::Backend(e.to_string()))
        })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.state
                .remove(key.as_bytes())
                .map(|_| ())
                .map_err(|e| StoreError::Backend(e.to_string()))
        })
    }
}
