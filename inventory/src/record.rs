//! Inventory records and their validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default reorder threshold for new records.
pub const DEFAULT_MIN_STOCK: u32 = 5;

/// Validation and lookup failures for inventory operations.
///
/// These are boundary rejections: the operation is a no-op with no partial
/// mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Product name is required and must be non-empty.
    #[error("Product name is required")]
    EmptyName,

    /// A numeric field would be negative or non-finite.
    #[error("Invalid value for {field}: {value}")]
    InvalidValue {
        /// Which field was rejected.
        field: &'static str,
        /// The offending value, as text.
        value: String,
    },

    /// No record with the given id.
    #[error("Unknown product: {0}")]
    UnknownProduct(String),
}

/// One tracked product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    /// Record id (uuid).
    pub id: String,
    /// Display name; fuzzy matching operates on this.
    pub name: String,
    /// Units on hand. Never negative: decrements clamp at zero.
    pub current_stock: u32,
    /// Reorder threshold; at or below it the record is low-stock.
    pub min_stock: u32,
    /// Optional shelf capacity.
    pub max_stock: Option<u32>,
    /// Unit price.
    pub price: f64,
    /// Category slug.
    pub category: String,
    /// Optional supplier name.
    pub supplier: Option<String>,
    /// Last time a restock increased the stock.
    pub last_restocked: Option<DateTime<Utc>>,
    /// Last mutation of any kind.
    pub last_updated: DateTime<Utc>,
    /// Soft-removal flag.
    pub is_active: bool,
    /// Lifetime sales counted against this record.
    pub total_sales: u64,
}

/// Stock classification after a mutation.
///
/// `Out` outranks `Low`: a record at zero stock is out-of-stock even though
/// it is also at-or-below its reorder threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLevel {
    /// No units left.
    Out,
    /// At or below the reorder threshold.
    Low,
    /// Comfortably stocked.
    Normal,
}

impl InventoryRecord {
    /// Classify the record's current stock.
    #[must_use]
    pub const fn stock_level(&self) -> StockLevel {
        if self.current_stock == 0 {
            StockLevel::Out
        } else if self.current_stock <= self.min_stock {
            StockLevel::Low
        } else {
            StockLevel::Normal
        }
    }
}

/// Why a stock value is being set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChangeReason {
    /// Shelf refill; bumps `last_restocked` when the value increased.
    Restock,
    /// Manual correction / audit adjustment.
    Correction,
}

/// Input for manually adding a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    /// Display name (required, non-empty).
    pub name: String,
    /// Initial stock.
    pub stock: u32,
    /// Reorder threshold; defaults to [`DEFAULT_MIN_STOCK`].
    pub min_stock: Option<u32>,
    /// Optional shelf capacity.
    pub max_stock: Option<u32>,
    /// Unit price (must be finite and non-negative).
    pub price: f64,
    /// Category slug.
    pub category: String,
    /// Optional supplier name.
    pub supplier: Option<String>,
}

impl NewProduct {
    /// Minimal input: name, stock, and price, category defaulted from the
    /// catalog.
    #[must_use]
    pub fn new(name: impl Into<String>, stock: u32, price: f64) -> Self {
        let name = name.into();
        let category = vendwatch_core::catalog::lookup(&name).category.to_string();
        Self {
            name,
            stock,
            min_stock: None,
            max_stock: None,
            price,
            category,
            supplier: None,
        }
    }

    /// Validate the input.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError`] for an empty name or an invalid price.
    pub fn validate(&self) -> Result<(), InventoryError> {
        if self.name.trim().is_empty() {
            return Err(InventoryError::EmptyName);
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(InventoryError::InvalidValue {
                field: "price",
                value: self.price.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stock: u32, min_stock: u32) -> InventoryRecord {
        InventoryRecord {
            id: "r1".to_string(),
            name: "Cola".to_string(),
            current_stock: stock,
            min_stock,
            max_stock: None,
            price: 1.5,
            category: "beverages".to_string(),
            supplier: None,
            last_restocked: None,
            last_updated: Utc::now(),
            is_active: true,
            total_sales: 0,
        }
    }

    #[test]
    fn out_takes_precedence_over_low() {
        assert_eq!(record(0, 5).stock_level(), StockLevel::Out);
        assert_eq!(record(3, 5).stock_level(), StockLevel::Low);
        assert_eq!(record(5, 5).stock_level(), StockLevel::Low);
        assert_eq!(record(6, 5).stock_level(), StockLevel::Normal);
    }

    #[test]
    fn new_product_validation() {
        assert!(NewProduct::new("Cola", 10, 1.5).validate().is_ok());
        assert_eq!(
            NewProduct::new("  ", 10, 1.5).validate(),
            Err(InventoryError::EmptyName)
        );
        assert!(matches!(
            NewProduct::new("Cola", 10, -1.0).validate(),
            Err(InventoryError::InvalidValue { field: "price", .. })
        ));
    }

    #[test]
    fn new_product_defaults_category_from_catalog() {
        assert_eq!(NewProduct::new("Cola Classic", 10, 1.5).category, "beverages");
        assert_eq!(NewProduct::new("Mystery", 10, 1.0).category, "other");
    }
}
