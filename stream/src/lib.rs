//! # Vendwatch Stream
//!
//! Reconnecting WebSocket stream client for the Vendwatch ingestion core.
//!
//! The client manages a single logical connection to an event source and
//! owns everything that makes the feed tolerable when the source misbehaves:
//!
//! - **State machine**: `disconnected → connecting → connected →
//!   (reconnecting ⇄ connecting)`, terminal only on manual disconnect or
//!   after the backoff policy gives up
//! - **Reconnection**: exponential backoff with random jitter, capped delay,
//!   bounded attempts, and a single terminal [`ClientEvent::GaveUp`] signal
//! - **Framing & validation**: inbound frames are classified
//!   (`Sale | NonSale | Malformed`) with the same validation the analytics
//!   engine applies, so invalid payloads die at the boundary
//! - **Outbound queueing**: sends while disconnected are queued and flushed
//!   FIFO on the next connect
//! - **Heartbeat**: a lightweight `{"type":"ping"}` payload on a fixed
//!   interval keeps the channel alive
//!
//! The stream source is treated as unreliable and best-effort: the client's
//! job is to tolerate its failures, not to guarantee exactly-once delivery.

pub mod backoff;
pub mod client;
pub mod message;

pub use backoff::{ReconnectPolicy, ReconnectPolicyBuilder};
pub use client::{StreamClient, StreamConfig};
pub use message::{ClientEvent, ConnectionState, Heartbeat, OutboundMessage};
