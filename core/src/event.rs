//! The enriched purchase event.
//!
//! A [`SaleEvent`] is created exactly once, at validated ingestion, by
//! combining a [`SalePayload`](crate::payload::SalePayload) with a receipt
//! timestamp. Enrichment attaches the catalog fields (category, emoji,
//! color) and the calendar fields (hour, weekday, ISO week, month, year),
//! all derived in UTC. Once created, an event is immutable: it is persisted
//! append-only and never updated.

use crate::catalog;
use crate::payload::SalePayload;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An enriched, immutable purchase event.
///
/// Field names serialize in camelCase, matching the wire format and the
/// persisted collections.
///
/// # Invariants
///
/// - `product_name` passed sale validation (non-empty, safe charset)
/// - `price` is finite and non-negative
/// - the derived fields agree with `timestamp` interpreted in UTC and are
///   never recomputed after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleEvent {
    /// Unique event id; generated (uuid v4) when the payload carried none.
    pub id: String,
    /// Validated product name, verbatim from the payload (no case folding).
    pub product_name: String,
    /// Sale price, non-negative.
    pub price: f64,
    /// Event time; payload timestamp when valid, else receipt time.
    pub timestamp: DateTime<Utc>,
    /// Catalog category (e.g. `"beverages"`, `"snacks"`; `"other"` fallback).
    pub category: String,
    /// Catalog emoji.
    pub emoji: String,
    /// Catalog display color (hex).
    pub color: String,
    /// Hour of day, 0-23.
    pub hour: u8,
    /// Day of week, 0 = Sunday through 6 = Saturday.
    pub day_of_week: u8,
    /// ISO week of year, 1-53.
    pub week_of_year: u8,
    /// Month, 1-12.
    pub month: u8,
    /// Calendar year.
    pub year: i32,
}

impl SaleEvent {
    /// Enrich a validated payload into a stored event.
    ///
    /// `received_at` is used when the payload carried no (valid) timestamp,
    /// and an id is generated when the payload carried none. The catalog and
    /// calendar fields are derived here, once.
    #[must_use]
    pub fn from_payload(payload: SalePayload, received_at: DateTime<Utc>) -> Self {
        let timestamp = payload.timestamp.unwrap_or(received_at);
        let entry = catalog::lookup(&payload.product_name);

        Self {
            id: payload.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            product_name: payload.product_name,
            price: payload.price,
            timestamp,
            category: entry.category.to_string(),
            emoji: entry.emoji.to_string(),
            color: entry.color.to_string(),
            hour: timestamp.hour() as u8,
            day_of_week: timestamp.weekday().num_days_from_sunday() as u8,
            week_of_year: timestamp.iso_week().week() as u8,
            month: timestamp.month() as u8,
            year: timestamp.year(),
        }
    }

    /// Event time as epoch milliseconds (storage key ordering).
    #[must_use]
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}
