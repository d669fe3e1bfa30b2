//! Backend selection and graceful degradation.
//!
//! [`DurableEventStore`] composes a preferred backend with a fallback and
//! implements the storage failure policy:
//!
//! - open prefers the indexed sled backend, falling back to the flat-file
//!   store when sled is unavailable
//! - a failed write is retried once against the fallback, then dropped with
//!   a logged warning (the event is lost, not requeued)
//! - a quota failure triggers oldest-first trimming before the retry
//! - a failed read degrades to an empty result instead of raising
//!
//! Callers on the stream-processing path therefore never see a storage
//! error surface as anything other than a log line.

use crate::flatfile::FlatFileStore;
use crate::indexed::SledEventStore;
use crate::store::{EventQuery, EventStore, StateStore, StoreError};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use vendwatch_core::SaleEvent;

/// Fraction of the log kept when quota pressure forces a trim.
const QUOTA_TRIM_KEEP_RATIO: f64 = 0.75;

/// An event/state store that degrades gracefully across backends.
#[derive(Clone)]
pub struct DurableEventStore {
    primary: Arc<dyn EventStore>,
    fallback: Option<Arc<dyn EventStore>>,
    state: Arc<dyn StateStore>,
}

impl DurableEventStore {
    /// Open local storage under `dir`, selecting the most capable backend.
    ///
    /// The sled database lives in `dir/db`, the flat-file fallback directly
    /// in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] only when neither backend can be opened
    /// (the directory itself is unusable).
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        match SledEventStore::open(dir.join("db")) {
            Ok(indexed) => {
                let indexed = Arc::new(indexed);
                let fallback = match FlatFileStore::open(dir) {
                    Ok(ff) => Some(Arc::new(ff) as Arc<dyn EventStore>),
                    Err(e) => {
                        tracing::warn!(error = %e, "Flat-file fallback unavailable");
                        None
                    }
                };
                Ok(Self {
                    primary: indexed.clone(),
                    fallback,
                    state: indexed,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Indexed backend unavailable, using flat-file store");
                let flat = Arc::new(FlatFileStore::open(dir)?);
                Ok(Self {
                    primary: flat.clone(),
                    fallback: None,
                    state: flat,
                })
            }
        }
    }

    /// Compose explicit backends (tests inject failing primaries here).
    #[must_use]
    pub fn with_backends(
        primary: Arc<dyn EventStore>,
        fallback: Option<Arc<dyn EventStore>>,
        state: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            primary,
            fallback,
            state,
        }
    }

    /// The state store of the selected backend.
    #[must_use]
    pub fn state(&self) -> Arc<dyn StateStore> {
        self.state.clone()
    }

    async fn append_with_degradation(&self, event: SaleEvent) -> Result<(), StoreError> {
        let first = match self.primary.append(event.clone()).await {
            Ok(()) => return Ok(()),
            Err(StoreError::QuotaExceeded(reason)) => {
                // Quota pressure: trim the oldest quarter and retry the
                // primary once before touching the fallback.
                tracing::warn!(reason = %reason, "Storage quota exceeded, trimming oldest events");
                let total = self.primary.count().await.unwrap_or(0);
                #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let keep = (total as f64 * QUOTA_TRIM_KEEP_RATIO) as usize;
                if let Err(e) = self.primary.trim_oldest(keep).await {
                    tracing::warn!(error = %e, "Trim after quota failure also failed");
                }
                match self.primary.append(event.clone()).await {
                    Ok(()) => return Ok(()),
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        tracing::warn!(error = %first, event_id = %event.id, "Primary write failed");
        let Some(fallback) = &self.fallback else {
            tracing::warn!(event_id = %event.id, "No fallback backend, dropping event");
            return Err(first);
        };

        match fallback.append(event.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, event_id = %event.id, "Fallback write failed, dropping event");
                Err(e)
            }
        }
    }
}

impl EventStore for DurableEventStore {
    fn append(
        &self,
        event: SaleEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(self.append_with_degradation(event))
    }

    fn bulk_replace(
        &self,
        events: Vec<SaleEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            match self.primary.bulk_replace(events.clone()).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::warn!(error = %e, "Primary bulk replace failed");
                    match &self.fallback {
                        Some(fallback) => fallback.bulk_replace(events).await,
                        None => Err(e),
                    }
                }
            }
        })
    }

    fn query(
        &self,
        query: EventQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SaleEvent>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            match self.primary.query(query).await {
                Ok(events) => Ok(events),
                Err(e) => {
                    // Reads degrade to empty rather than raising.
                    tracing::warn!(error = %e, "Query failed, returning empty result");
                    Ok(Vec::new())
                }
            }
        })
    }

    fn count(&self) -> Pin<Box<dyn Future<Output = Result<usize, StoreError>> + Send + '_>> {
        Box::pin(async move { Ok(self.primary.count().await.unwrap_or(0)) })
    }

    fn trim_oldest(
        &self,
        keep: usize,
    ) -> Pin<Box<dyn Future<Output = Result<usize, StoreError>> + Send + '_>> {
        Box::pin(async move { self.primary.trim_oldest(keep).await })
    }
}

impl StateStore for DurableEventStore {
    fn save(
        &self,
        key: &str,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        self.state.save(key, data)
    }

    fn load(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send + '_>> {
        self.state.load(key)
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        self.state.delete(key)
    }
}
