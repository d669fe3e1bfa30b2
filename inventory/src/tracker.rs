//! The inventory tracker service.
//!
//! Maintains per-product stock levels reactively as sale events arrive, and
//! surfaces threshold-crossing alerts with a per-record cooldown.
//!
//! # Matching
//!
//! Sale events carry free-form product names; records are found with an
//! explicit two-phase lookup — exact case-insensitive match first, then
//! substring containment in either direction. Unmatched sales auto-create a
//! record with stock zero when auto-tracking is enabled.

use crate::record::{
    DEFAULT_MIN_STOCK, InventoryError, InventoryRecord, NewProduct, StockChangeReason, StockLevel,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;
use vendwatch_core::SaleEvent;
use vendwatch_core::environment::Clock;
use vendwatch_storage::{INVENTORY_KEY, StateStore, StoreError};

/// Minimum interval between repeated alerts for the same record.
const ALERT_COOLDOWN_MINUTES: i64 = 30;

/// Capacity of the alert broadcast channel.
const ALERT_BUFFER: usize = 64;

/// A threshold-crossing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAlert {
    /// Id of the affected record.
    pub record_id: String,
    /// Product name.
    pub name: String,
    /// `Out` or `Low` (never `Normal`).
    pub level: StockLevel,
    /// Stock after the triggering mutation.
    pub current_stock: u32,
    /// When the alert fired.
    pub at: DateTime<Utc>,
}

/// Aggregate inventory numbers for the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryStats {
    /// All records, active or not.
    pub total_products: u64,
    /// Records with `is_active`.
    pub active_products: u64,
    /// Active records at zero stock.
    pub out_of_stock: u64,
    /// Active records at or below their reorder threshold (excluding out).
    pub low_stock: u64,
    /// Sum of `stock × price` over active records.
    pub total_stock_value: f64,
    /// Lifetime sales across all records.
    pub total_sales: u64,
}

/// Long-lived inventory service.
///
/// Owns the record map exclusively; collaborators interact through sale
/// events and the explicit mutation API, and observe threshold crossings
/// via [`subscribe_alerts`](Self::subscribe_alerts).
pub struct InventoryTracker {
    state: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    records: RwLock<Vec<InventoryRecord>>,
    last_alert: RwLock<HashMap<String, DateTime<Utc>>>,
    alerts: broadcast::Sender<StockAlert>,
    auto_track: bool,
    cooldown: Duration,
}

impl InventoryTracker {
    /// Create a tracker persisting through `state`, reading time through
    /// `clock`. Auto-tracking of unknown products is enabled by default.
    #[must_use]
    pub fn new(state: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_BUFFER);
        Self {
            state,
            clock,
            records: RwLock::new(Vec::new()),
            last_alert: RwLock::new(HashMap::new()),
            alerts,
            auto_track: true,
            cooldown: Duration::minutes(ALERT_COOLDOWN_MINUTES),
        }
    }

    /// Enable or disable auto-creation of records for unmatched sales.
    #[must_use]
    pub const fn with_auto_track(mut self, auto_track: bool) -> Self {
        self.auto_track = auto_track;
        self
    }

    /// Override the alert cooldown (tests use short windows).
    #[must_use]
    pub const fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Subscribe to stock alerts.
    #[must_use]
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<StockAlert> {
        self.alerts.subscribe()
    }

    /// Load the persisted record set. Call once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the state store read fails. A corrupt
    /// collection is logged and treated as empty.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let loaded = match self.state.load(INVENTORY_KEY).await? {
            Some(bytes) => match serde_json::from_slice::<Vec<InventoryRecord>>(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(error = %e, "Corrupt inventory collection, starting empty");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let count = loaded.len();
        *self.records.write().await = loaded;
        Ok(count)
    }

    /// Apply one observed sale event.
    ///
    /// Fuzzy-matches the event's product name; on a match the stock is
    /// decremented (clamped at zero) and the lifetime sales counter bumped.
    /// Unmatched sales create a stock-zero record when auto-tracking is on.
    /// Returns the alert fired by this mutation, if any.
    pub async fn record_sale(&self, event: &SaleEvent) -> Option<StockAlert> {
        let now = self.clock.now();
        let mutated = {
            let mut records = self.records.write().await;
            match find_match(&records, &event.product_name) {
                Some(i) => {
                    let record = &mut records[i];
                    record.current_stock = record.current_stock.saturating_sub(1);
                    record.total_sales += 1;
                    record.last_updated = now;
                    Some(record.clone())
                }
                None if self.auto_track => {
                    let record = InventoryRecord {
                        id: Uuid::new_v4().to_string(),
                        name: event.product_name.clone(),
                        current_stock: 0,
                        min_stock: DEFAULT_MIN_STOCK,
                        max_stock: None,
                        price: event.price,
                        category: event.category.clone(),
                        supplier: None,
                        last_restocked: None,
                        last_updated: now,
                        is_active: true,
                        total_sales: 1,
                    };
                    tracing::info!(product = %record.name, "Auto-tracking new product");
                    records.push(record.clone());
                    Some(record)
                }
                None => None,
            }
        };

        let record = mutated?;
        self.persist().await;
        self.maybe_alert(&record, now).await
    }

    /// Set a record's stock level.
    ///
    /// Negative input clamps to zero. `last_restocked` is stamped only when
    /// the reason is [`StockChangeReason::Restock`] *and* the value
    /// increased.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::UnknownProduct`] for an unknown id.
    pub async fn set_stock(
        &self,
        id: &str,
        new_value: i64,
        reason: StockChangeReason,
    ) -> Result<InventoryRecord, InventoryError> {
        let now = self.clock.now();
        let clamped = u32::try_from(new_value.max(0)).unwrap_or(u32::MAX);

        let updated = {
            let mut records = self.records.write().await;
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| InventoryError::UnknownProduct(id.to_string()))?;

            let increased = clamped > record.current_stock;
            record.current_stock = clamped;
            record.last_updated = now;
            if reason == StockChangeReason::Restock && increased {
                record.last_restocked = Some(now);
            }
            record.clone()
        };

        self.persist().await;
        self.maybe_alert(&updated, now).await;
        Ok(updated)
    }

    /// Manually add a product.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError`] when validation rejects the input; nothing
    /// is mutated in that case.
    pub async fn add_product(&self, product: NewProduct) -> Result<InventoryRecord, InventoryError> {
        product.validate()?;
        let now = self.clock.now();
        let record = InventoryRecord {
            id: Uuid::new_v4().to_string(),
            name: product.name.trim().to_string(),
            current_stock: product.stock,
            min_stock: product.min_stock.unwrap_or(DEFAULT_MIN_STOCK),
            max_stock: product.max_stock,
            price: product.price,
            category: product.category,
            supplier: product.supplier,
            last_restocked: None,
            last_updated: now,
            is_active: true,
            total_sales: 0,
        };

        self.records.write().await.push(record.clone());
        self.persist().await;
        Ok(record)
    }

    /// Soft-remove a record by clearing `is_active`.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::UnknownProduct`] for an unknown id.
    pub async fn deactivate(&self, id: &str) -> Result<(), InventoryError> {
        {
            let mut records = self.records.write().await;
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| InventoryError::UnknownProduct(id.to_string()))?;
            record.is_active = false;
            record.last_updated = self.clock.now();
        }
        self.persist().await;
        Ok(())
    }

    /// Physically delete a record.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::UnknownProduct`] for an unknown id.
    pub async fn remove(&self, id: &str) -> Result<(), InventoryError> {
        {
            let mut records = self.records.write().await;
            let before = records.len();
            records.retain(|r| r.id != id);
            if records.len() == before {
                return Err(InventoryError::UnknownProduct(id.to_string()));
            }
        }
        self.persist().await;
        Ok(())
    }

    /// All records, in insertion order.
    pub async fn list(&self) -> Vec<InventoryRecord> {
        self.records.read().await.clone()
    }

    /// Records whose name or category contains `query` (case-insensitive).
    pub async fn search(&self, query: &str) -> Vec<InventoryRecord> {
        let needle = query.to_lowercase();
        self.records
            .read()
            .await
            .iter()
            .filter(|r| {
                r.name.to_lowercase().contains(&needle)
                    || r.category.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// Aggregate inventory numbers.
    pub async fn stats(&self) -> InventoryStats {
        let records = self.records.read().await;
        let mut stats = InventoryStats {
            total_products: records.len() as u64,
            active_products: 0,
            out_of_stock: 0,
            low_stock: 0,
            total_stock_value: 0.0,
            total_sales: 0,
        };
        for record in records.iter() {
            stats.total_sales += record.total_sales;
            if !record.is_active {
                continue;
            }
            stats.active_products += 1;
            match record.stock_level() {
                StockLevel::Out => stats.out_of_stock += 1,
                StockLevel::Low => stats.low_stock += 1,
                StockLevel::Normal => {}
            }
            stats.total_stock_value += f64::from(record.current_stock) * record.price;
        }
        stats
    }

    /// Persist the full record set; failures are logged, never propagated
    /// into the sale-processing path.
    async fn persist(&self) {
        let records = self.records.read().await;
        match serde_json::to_vec(&*records) {
            Ok(bytes) => {
                if let Err(e) = self.state.save(INVENTORY_KEY, bytes).await {
                    tracing::warn!(error = %e, "Inventory persist failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Inventory serialize failed"),
        }
    }

    /// Emit an alert for a threshold crossing, honoring the per-record
    /// cooldown. `Out` outranks `Low` by construction of
    /// [`InventoryRecord::stock_level`].
    async fn maybe_alert(&self, record: &InventoryRecord, now: DateTime<Utc>) -> Option<StockAlert> {
        let level = record.stock_level();
        if level == StockLevel::Normal {
            return None;
        }

        {
            let last = self.last_alert.read().await;
            if let Some(previous) = last.get(&record.id) {
                if now - *previous < self.cooldown {
                    return None;
                }
            }
        }
        self.last_alert.write().await.insert(record.id.clone(), now);

        let alert = StockAlert {
            record_id: record.id.clone(),
            name: record.name.clone(),
            level,
            current_stock: record.current_stock,
            at: now,
        };
        tracing::warn!(product = %alert.name, level = ?alert.level, stock = alert.current_stock, "Stock alert");
        let _ = self.alerts.send(alert.clone());
        Some(alert)
    }
}

/// Two-phase fuzzy lookup: exact case-insensitive name match first, then
/// substring containment in either direction. Inactive records never match.
fn find_match(records: &[InventoryRecord], name: &str) -> Option<usize> {
    let needle = name.to_lowercase();

    if let Some(i) = records
        .iter()
        .position(|r| r.is_active && r.name.to_lowercase() == needle)
    {
        return Some(i);
    }

    records.iter().position(|r| {
        if !r.is_active {
            return false;
        }
        let tracked = r.name.to_lowercase();
        tracked.contains(&needle) || needle.contains(&tracked)
    })
}
