//! Size-bounded flat-file fallback backend.
//!
//! Used when the indexed sled backend cannot be opened. Each collection is
//! one JSON document in the storage directory (`sales.json` plus one file
//! per state key), mirroring the flat key-value layout of the least capable
//! device storage. The sales collection enforces an approximate cap of
//! twice the feed-display limit and trims oldest entries first on overflow.

use crate::store::{EventQuery, EventStore, StateStore, StoreError};
use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::sync::RwLock;
use vendwatch_core::SaleEvent;

/// Feed display limit; the sales cap is twice this.
const FEED_LIMIT: usize = 50;

/// Default cap on stored events in the fallback backend.
pub const DEFAULT_CAP: usize = FEED_LIMIT * 2;

/// Flat JSON-file event and state store.
///
/// Events are held in memory (oldest-first) and the whole collection is
/// rewritten on every mutation; with the cap at ~100 entries that rewrite
/// stays trivially small.
pub struct FlatFileStore {
    dir: PathBuf,
    cap: usize,
    events: RwLock<VecDeque<SaleEvent>>,
}

impl FlatFileStore {
    /// Open the store in `dir`, creating the directory and loading any
    /// previously persisted sales collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the directory cannot be created. A
    /// corrupt sales file is logged and treated as empty rather than
    /// failing the open.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_cap(dir, DEFAULT_CAP)
    }

    /// Open with an explicit event cap (tests use small caps).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the directory cannot be created.
    pub fn with_cap(dir: impl AsRef<Path>, cap: usize) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Io(e.to_string()))?;

        let events = match std::fs::read(dir.join("sales.json")) {
            Ok(bytes) => match serde_json::from_slice::<Vec<SaleEvent>>(&bytes) {
                Ok(events) => events.into_iter().collect(),
                Err(e) => {
                    tracing::warn!(error = %e, "Corrupt sales collection, starting empty");
                    VecDeque::new()
                }
            },
            Err(_) => VecDeque::new(),
        };

        Ok(Self {
            dir,
            cap,
            events: RwLock::new(events),
        })
    }

    fn sales_path(&self) -> PathBuf {
        self.dir.join("sales.json")
    }

    /// State keys may be namespaced with `/`; flatten for the filesystem.
    fn state_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key.replace('/', "_")))
    }

    fn persist(&self, events: &VecDeque<SaleEvent>) -> Result<(), StoreError> {
        let snapshot: Vec<&SaleEvent> = events.iter().collect();
        let bytes =
            serde_json::to_vec(&snapshot).map_err(|e| StoreError::Serialization(e.to_string()))?;
        std::fs::write(self.sales_path(), bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::StorageFull {
                StoreError::QuotaExceeded(e.to_string())
            } else {
                StoreError::Io(e.to_string())
            }
        })
    }
}

impl EventStore for FlatFileStore {
    fn append(
        &self,
        event: SaleEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut events = self.events.write().await;
            events.push_back(event);
            while events.len() > self.cap {
                events.pop_front();
            }
            self.persist(&events)
        })
    }

    fn bulk_replace(
        &self,
        events: Vec<SaleEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut guard = self.events.write().await;
            *guard = events.into_iter().collect();
            while guard.len() > self.cap {
                guard.pop_front();
            }
            self.persist(&guard)
        })
    }

    fn query(
        &self,
        query: EventQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SaleEvent>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let events = self.events.read().await;
            Ok(query.apply(events.iter().cloned().collect()))
        })
    }

    fn count(&self) -> Pin<Box<dyn Future<Output = Result<usize, StoreError>> + Send + '_>> {
        Box::pin(async move { Ok(self.events.read().await.len()) })
    }

    fn trim_oldest(
        &self,
        keep: usize,
    ) -> Pin<Box<dyn Future<Output = Result<usize, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut events = self.events.write().await;
            let mut removed = 0;
            while events.len() > keep {
                events.pop_front();
                removed += 1;
            }
            if removed > 0 {
                self.persist(&events)?;
            }
            Ok(removed)
        })
    }
}

impl StateStore for FlatFileStore {
    fn save(
        &self,
        key: &str,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let path = self.state_path(key);
        Box::pin(async move { std::fs::write(path, data).map_err(|e| StoreError::Io(e.to_string())) })
    }

    fn load(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send + '_>> {
        let path = self.state_path(key);
        Box::pin(async move {
            match std::fs::read(&path) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StoreError::Io(e.to_string())),
            }
        })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let path = self.state_path(key);
        Box::pin(async move {
            match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StoreError::Io(e.to_string())),
            }
        })
    }
}
