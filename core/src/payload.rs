//! Inbound payload classification and sale validation.
//!
//! Every frame arriving from the stream passes through
//! [`classify_payload`], a discriminated validation step with three
//! outcomes:
//!
//! - [`Classified::Sale`] — a structured object carrying a product-name
//!   field that passed sale validation
//! - [`Classified::NonSale`] — valid JSON that is not sale-shaped, or a
//!   frame that is not JSON at all (treated as an opaque string)
//! - [`Classified::Malformed`] — sale-shaped but invalid; logged and
//!   dropped at the boundary, never forwarded to consumers
//!
//! The same [`validate_sale`] function backs both the stream client and the
//! analytics engine's `add_event`, so an event accepted anywhere is accepted
//! everywhere.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Maximum accepted product-name length, in characters.
pub const MAX_PRODUCT_NAME_LEN: usize = 100;

/// JSON keys accepted as the product-name field, probed in order.
const PRODUCT_NAME_KEYS: &[&str] = &["productName", "product_name", "product", "name"];

/// Validation failures for sale-shaped payloads.
///
/// These are boundary rejections: the operation is a no-op and the payload
/// is dropped. They never unwind unrelated state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Payload is not a JSON object.
    #[error("Payload is not a JSON object")]
    NotAnObject,

    /// No product-name field present.
    #[error("Missing product name field")]
    MissingProductName,

    /// Product-name field is present but not a string.
    #[error("Product name is not a string")]
    ProductNameNotAString,

    /// Product name is empty after trimming.
    #[error("Product name is empty")]
    EmptyProductName,

    /// Product name contains characters outside the safe set, or is too long.
    #[error("Product name rejected: {0}")]
    UnsafeProductName(String),

    /// Price parsed to a negative value.
    #[error("Negative price rejected: {0}")]
    NegativePrice(String),
}

/// A validated (but not yet enriched) sale payload.
///
/// This is the shape that crosses from the stream boundary into the
/// analytics engine. Enrichment into a [`crate::event::SaleEvent`] happens
/// exactly once, at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalePayload {
    /// Upstream-assigned id, if the payload carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Validated product name, trimmed.
    pub product_name: String,
    /// Non-negative price; unparseable input defaults to `0.0`.
    pub price: f64,
    /// Event time, if the payload carried a valid epoch-ms timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Outcome of classifying one inbound frame.
#[derive(Debug, Clone)]
pub enum Classified {
    /// A validated sale payload.
    Sale(SalePayload),
    /// Valid-but-not-a-sale content, passed through as opaque text.
    NonSale(String),
    /// Sale-shaped but invalid; dropped at the boundary.
    Malformed {
        /// Why validation rejected the payload.
        reason: ValidationError,
    },
}

/// Classify a raw inbound frame.
///
/// Attempts a JSON decode; frames that fail to decode are opaque
/// [`Classified::NonSale`] text. Decoded objects carrying a
/// product-name-like field go through [`validate_sale`]; everything else is
/// non-sale content.
#[must_use]
pub fn classify_payload(raw: &str) -> Classified {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return Classified::NonSale(raw.to_string());
    };

    let is_sale_shaped = value
        .as_object()
        .is_some_and(|obj| PRODUCT_NAME_KEYS.iter().any(|key| obj.contains_key(*key)));

    if !is_sale_shaped {
        return Classified::NonSale(raw.to_string());
    }

    match validate_sale(&value) {
        Ok(payload) => Classified::Sale(payload),
        Err(reason) => Classified::Malformed { reason },
    }
}

/// Validate a sale-shaped JSON value into a [`SalePayload`].
///
/// Rules:
///
/// - product name: required, string, non-empty after trimming, safe
///   character set, at most [`MAX_PRODUCT_NAME_LEN`] characters
/// - price: JSON number or currency-formatted string; unparseable input
///   defaults to `0.0`; a parsed negative value is rejected
/// - timestamp: optional epoch milliseconds; invalid values are ignored
///   (the caller substitutes receipt time)
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the first rule violated.
pub fn validate_sale(value: &Value) -> Result<SalePayload, ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

    let name_value = PRODUCT_NAME_KEYS
        .iter()
        .find_map(|key| obj.get(*key))
        .ok_or(ValidationError::MissingProductName)?;

    let name = name_value
        .as_str()
        .ok_or(ValidationError::ProductNameNotAString)?
        .trim();

    if name.is_empty() {
        return Err(ValidationError::EmptyProductName);
    }
    if !is_safe_product_name(name) {
        return Err(ValidationError::UnsafeProductName(name.to_string()));
    }

    let price = match obj.get("price") {
        Some(raw_price) => match parse_price(raw_price) {
            Some(p) if p < 0.0 => {
                return Err(ValidationError::NegativePrice(raw_price.to_string()));
            }
            Some(p) => p,
            None => {
                tracing::debug!(price = %raw_price, "Unparseable price, defaulting to 0");
                0.0
            }
        },
        None => 0.0,
    };

    let timestamp = obj.get("timestamp").and_then(parse_timestamp_ms);

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    Ok(SalePayload {
        id,
        product_name: name.to_string(),
        price,
        timestamp,
    })
}

/// Parse a price from a JSON number or a currency-formatted string.
///
/// String input is stripped of currency symbols and whitespace; thousands
/// separators are removed, and a trailing decimal comma (`"1,50"`) is
/// treated as a decimal point. Returns `None` for input that still fails to
/// parse, or for non-finite numbers.
#[must_use]
pub fn parse_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|p| p.is_finite()),
        Value::String(s) => parse_price_str(s),
        _ => None,
    }
}

fn parse_price_str(s: &str) -> Option<f64> {
    let stripped: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥') && !c.is_whitespace())
        .collect();

    if stripped.is_empty() {
        return None;
    }

    // "1.234,50" and "1,50" use a decimal comma; "1,234.50" uses comma as a
    // thousands separator only.
    let normalized = if stripped.contains(',') {
        let decimal_comma = !stripped.contains('.')
            && stripped.rsplit_once(',').is_some_and(|(head, frac)| {
                !head.contains(',') && frac.len() == 2 && frac.chars().all(|c| c.is_ascii_digit())
            });
        if decimal_comma {
            stripped.replace(',', ".")
        } else {
            stripped.replace(',', "")
        }
    } else {
        stripped
    };

    normalized.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Interpret a JSON value as an epoch-milliseconds timestamp.
///
/// Only positive values that convert cleanly are accepted; everything else
/// is `None` and the caller falls back to receipt time.
fn parse_timestamp_ms(value: &Value) -> Option<DateTime<Utc>> {
    let ms = value.as_i64().filter(|ms| *ms > 0)?;
    Utc.timestamp_millis_opt(ms).single()
}

/// Whether a product name stays inside the safe character set.
///
/// Allowed: Unicode alphanumerics, spaces, and a small set of punctuation
/// seen in real product labels.
#[must_use]
pub fn is_safe_product_name(name: &str) -> bool {
    name.chars().count() <= MAX_PRODUCT_NAME_LEN
        && name.chars().all(|c| {
            c.is_alphanumeric()
                || c == ' '
                || matches!(c, '-' | '\'' | '&' | '.' | '(' | ')' | ',' | '!')
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_valid_sale() {
        let raw = r#"{"productName":"Cola","price":1.5,"timestamp":1700000000000}"#;
        match classify_payload(raw) {
            Classified::Sale(payload) => {
                assert_eq!(payload.product_name, "Cola");
                assert!((payload.price - 1.5).abs() < f64::EPSILON);
                assert!(payload.timestamp.is_some());
            }
            other => panic!("expected sale, got {other:?}"),
        }
    }

    #[test]
    fn non_json_is_opaque_text() {
        assert!(matches!(
            classify_payload("hello there"),
            Classified::NonSale(_)
        ));
    }

    #[test]
    fn json_without_product_field_is_non_sale() {
        assert!(matches!(
            classify_payload(r#"{"type":"ping","timestamp":1}"#),
            Classified::NonSale(_)
        ));
    }

    #[test]
    fn empty_product_name_is_malformed() {
        assert!(matches!(
            classify_payload(r#"{"productName":"","price":1}"#),
            Classified::Malformed {
                reason: ValidationError::EmptyProductName
            }
        ));
    }

    #[test]
    fn unsafe_name_is_malformed() {
        assert!(matches!(
            classify_payload(r#"{"productName":"<script>alert(1)</script>","price":1}"#),
            Classified::Malformed {
                reason: ValidationError::UnsafeProductName(_)
            }
        ));
    }

    #[test]
    fn negative_price_is_rejected() {
        let err = validate_sale(&json!({"productName": "Cola", "price": -2.0}));
        assert!(matches!(err, Err(ValidationError::NegativePrice(_))));
    }

    #[test]
    fn currency_string_prices_parse() {
        assert_eq!(parse_price(&json!("$1.50")), Some(1.5));
        assert_eq!(parse_price(&json!("€2")), Some(2.0));
        assert_eq!(parse_price(&json!("1,234.50")), Some(1234.5));
        assert_eq!(parse_price(&json!("1,50")), Some(1.5));
        assert_eq!(parse_price(&json!(" £ 3.25 ")), Some(3.25));
    }

    #[test]
    fn unparseable_price_defaults_to_zero() {
        let payload = validate_sale(&json!({"productName": "Cola", "price": "free"}))
            .expect("name is valid");
        assert!((payload.price - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_price_defaults_to_zero() {
        let payload = validate_sale(&json!({"productName": "Cola"})).expect("name is valid");
        assert!((payload.price - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_timestamp_is_ignored() {
        let payload = validate_sale(&json!({
            "productName": "Cola",
            "price": 1,
            "timestamp": "yesterday"
        }))
        .expect("name is valid");
        assert!(payload.timestamp.is_none());

        let payload =
            validate_sale(&json!({"productName": "Cola", "price": 1, "timestamp": -5}))
                .expect("name is valid");
        assert!(payload.timestamp.is_none());
    }

    #[test]
    fn alternate_product_name_keys_are_accepted() {
        for key in ["product_name", "product", "name"] {
            let value = json!({key: "Water", "price": 1});
            assert!(validate_sale(&value).is_ok(), "key {key} should validate");
        }
    }
}
