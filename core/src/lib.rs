//! # Vendwatch Core
//!
//! Core domain types for the Vendwatch ingestion-and-analytics core.
//!
//! This crate provides the fundamental building blocks shared by every other
//! Vendwatch crate:
//!
//! - **Sale events**: the enriched, immutable purchase event
//!   ([`event::SaleEvent`]) and the validated wire payload
//!   ([`payload::SalePayload`])
//! - **Payload classification**: the discriminated validation step that turns
//!   an inbound frame into `Sale | NonSale | Malformed`
//!   ([`payload::classify_payload`])
//! - **Enrichment**: the one-time derivation of category/emoji/color and
//!   calendar fields attached to an event at ingestion ([`catalog`])
//! - **Environment**: the [`environment::Clock`] trait injected everywhere
//!   time is read, so period windows are deterministic under test
//!
//! ## Architecture Principles
//!
//! - Events are facts: enriched once, never mutated afterwards
//! - Validation happens exactly once, at the boundary, with a typed result
//! - All calendar derivation uses UTC as the fixed locale
//! - Dependencies (time) are injected via traits, never read ambiently
//!
//! ## Example
//!
//! ```
//! use vendwatch_core::payload::{classify_payload, Classified};
//! use vendwatch_core::event::SaleEvent;
//! use chrono::Utc;
//!
//! let frame = r#"{"productName":"Cola","price":"$1.50"}"#;
//! match classify_payload(frame) {
//!     Classified::Sale(payload) => {
//!         let event = SaleEvent::from_payload(payload, Utc::now());
//!         assert_eq!(event.category, "beverages");
//!         assert!((event.price - 1.5).abs() < f64::EPSILON);
//!     }
//!     _ => panic!("expected a sale"),
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod catalog;
pub mod environment;
pub mod event;
pub mod payload;

pub use event::SaleEvent;
pub use payload::{Classified, SalePayload, ValidationError};
