//! Client-side message types: connection states, observable events, and
//! outbound framing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use vendwatch_core::SalePayload;

/// Connection lifecycle states.
///
/// `disconnected → connecting → connected → (reconnecting ⇄ connecting)`,
/// terminal in `Disconnected` only on manual close or after the reconnect
/// policy gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none being attempted.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Live connection; heartbeat running, sends go straight out.
    Connected,
    /// Waiting out a backoff delay before the next attempt.
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        };
        write!(f, "{s}")
    }
}

/// Events the stream client broadcasts to subscribers.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The connection state changed.
    StateChanged {
        /// State before the transition.
        previous: ConnectionState,
        /// State after the transition.
        current: ConnectionState,
    },
    /// A validated sale payload arrived.
    Sale {
        /// The decoded, validated payload.
        sale: SalePayload,
        /// The raw frame as received.
        raw: String,
        /// Receipt time.
        received_at: DateTime<Utc>,
    },
    /// A non-sale frame arrived (opaque text or unrelated JSON).
    Message {
        /// The raw frame.
        text: String,
        /// Receipt time.
        received_at: DateTime<Utc>,
    },
    /// A recoverable transport error; the reconnect policy takes over.
    Error(String),
    /// The reconnect policy exhausted its attempts. Terminal for this
    /// session; emitted exactly once.
    GaveUp {
        /// Number of attempts made before giving up.
        attempts: u32,
    },
}

/// An application message to transmit.
///
/// Strings pass through untouched; JSON values are encoded on send.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Raw text, transmitted as-is.
    Text(String),
    /// A JSON value, serialized before transmission.
    Json(serde_json::Value),
}

impl OutboundMessage {
    /// Serialize for the wire.
    #[must_use]
    pub fn encode(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

impl From<&str> for OutboundMessage {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<serde_json::Value> for OutboundMessage {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// The lightweight heartbeat payload sent while connected.
#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    /// Always `"ping"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Epoch milliseconds at send time.
    pub timestamp: i64,
}

impl Heartbeat {
    /// Build a heartbeat stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        Self {
            kind: "ping",
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Encode for the wire: `{"type":"ping","timestamp":<ms>}`.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"ping"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_text_passes_through() {
        let msg: OutboundMessage = "hello".into();
        assert_eq!(msg.encode(), "hello");
    }

    #[test]
    fn outbound_json_is_encoded() {
        let msg: OutboundMessage = serde_json::json!({"a": 1}).into();
        assert_eq!(msg.encode(), r#"{"a":1}"#);
    }

    #[test]
    fn heartbeat_wire_shape() {
        let hb = Heartbeat {
            kind: "ping",
            timestamp: 1_700_000_000_000,
        };
        assert_eq!(hb.encode(), r#"{"type":"ping","timestamp":1700000000000}"#);
    }
}
