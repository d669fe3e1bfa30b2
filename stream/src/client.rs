//! The reconnecting stream client.
//!
//! [`StreamClient`] maintains a best-effort live connection to one
//! event-producing WebSocket endpoint, delivers parsed application
//! messages, and recovers automatically from failure.
//!
//! # Architecture
//!
//! ```text
//! caller                StreamClient               supervisor task
//!   │                        │                          │
//!   ├─ connect() ───────────>├─ spawn ─────────────────>│
//!   │                        │                          ├─ connect_async (10s timeout)
//!   ├─ send(msg) ───────────>│ connected? ── writer ───>│  heartbeat ──> ping
//!   │          └─ queued when not                       │  inbound ──> classify ──> broadcast
//!   ├─ subscribe() <─────────┤<──── ClientEvent broadcast┤
//!   ├─ disconnect() ────────>│ manual-close watch ─────>│  (cancels all timers, joins)
//! ```
//!
//! A single supervisor task owns the transport. Non-manual closure of any
//! kind re-enters the exponential backoff schedule; manual disconnect
//! cancels every pending timer before `disconnect()` returns.

use crate::backoff::ReconnectPolicy;
use crate::message::{ClientEvent, ConnectionState, Heartbeat, OutboundMessage};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use vendwatch_core::payload::{Classified, classify_payload};

/// Default connection-establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default heartbeat interval while connected.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Capacity of the client-event broadcast channel.
const EVENT_BUFFER: usize = 256;

/// Stream client configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint (`ws://...`).
    pub url: String,
    /// Reconnection backoff policy.
    pub policy: ReconnectPolicy,
    /// Connection-establishment timeout; expiry counts as a failed attempt.
    pub connect_timeout: Duration,
    /// Interval between heartbeat pings while connected.
    pub heartbeat_interval: Duration,
}

impl StreamConfig {
    /// Configuration with defaults for everything but the endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            policy: ReconnectPolicy::default(),
            connect_timeout: CONNECT_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    /// Override the reconnection policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the connection-establishment timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the heartbeat interval.
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

/// State shared between the handle and the supervisor task.
struct Shared {
    config: StreamConfig,
    events: broadcast::Sender<ClientEvent>,
    state: watch::Sender<ConnectionState>,
    manual_close: watch::Sender<bool>,
    /// Messages queued while disconnected, flushed FIFO on connect.
    outbound: Mutex<VecDeque<String>>,
    /// Present exactly while a connection is live.
    writer: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

/// A reconnecting WebSocket client for one logical event source.
///
/// Long-lived service object: construct once, share by `Arc`, subscribe for
/// [`ClientEvent`]s.
///
/// # Example
///
/// ```no_run
/// use vendwatch_stream::{ClientEvent, StreamClient, StreamConfig};
///
/// # async fn example() {
/// let client = StreamClient::new(StreamConfig::new("ws://localhost:8080/events"));
/// let mut events = client.subscribe();
/// client.connect().await;
///
/// while let Ok(event) = events.recv().await {
///     if let ClientEvent::Sale { sale, .. } = event {
///         println!("sold: {}", sale.product_name);
///     }
/// }
/// # }
/// ```
pub struct StreamClient {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamClient {
    /// Create a client. No connection is attempted until [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (manual_close, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                config,
                events,
                state,
                manual_close,
                outbound: Mutex::new(VecDeque::new()),
                writer: Mutex::new(None),
            }),
            task: Mutex::new(None),
        }
    }

    /// Subscribe to client events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.shared.events.subscribe()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch connection-state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Start the connection supervisor.
    ///
    /// No-op (returning `false`) when the client is already
    /// connecting/connected/reconnecting. Clears a previous manual-close
    /// flag so a client can be reconnected after `disconnect()`.
    pub async fn connect(&self) -> bool {
        let mut task = self.task.lock().await;
        let running = task.as_ref().is_some_and(|handle| !handle.is_finished());
        if running {
            tracing::debug!("connect() ignored, supervisor already running");
            return false;
        }

        self.shared.manual_close.send_replace(false);
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(run_supervisor(shared)));
        true
    }

    /// Send an application message.
    ///
    /// Returns `true` when handed to a live connection. When disconnected
    /// the message is queued for the next connect and `false` is returned —
    /// expected backpressure, not an error.
    pub async fn send(&self, message: impl Into<OutboundMessage>) -> bool {
        let text = message.into().encode();

        if *self.shared.state.borrow() == ConnectionState::Connected {
            let writer = self.shared.writer.lock().await;
            if let Some(tx) = writer.as_ref() {
                if tx.send(Message::Text(text.clone())).is_ok() {
                    return true;
                }
            }
        }

        self.shared.outbound.lock().await.push_back(text);
        false
    }

    /// Number of messages queued for the next connect.
    pub async fn queued(&self) -> usize {
        self.shared.outbound.lock().await.len()
    }

    /// Manually close the connection and suppress reconnection.
    ///
    /// Waits for the supervisor to wind down, which drops every pending
    /// timer (heartbeat, reconnect delay, connect timeout) — none may fire
    /// after this returns.
    pub async fn disconnect(&self) {
        self.shared.manual_close.send_replace(true);
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        set_state(&self.shared, ConnectionState::Disconnected);
    }
}

/// Why a live connection ended.
enum SessionEnd {
    /// Caller asked for it; suppress reconnection.
    Manual,
    /// Transport failure or remote close; re-enter the backoff schedule.
    Transport,
}

#[allow(clippy::cognitive_complexity)] // Connection lifecycle with backoff in one loop
async fn run_supervisor(shared: Arc<Shared>) {
    let mut manual = shared.manual_close.subscribe();
    let mut attempts: u32 = 0;

    loop {
        if *manual.borrow() {
            break;
        }

        set_state(&shared, ConnectionState::Connecting);

        let connected = tokio::select! {
            result = timeout(shared.config.connect_timeout, connect_async(shared.config.url.as_str())) => {
                match result {
                    Ok(Ok((ws, _response))) => Some(ws),
                    Ok(Err(e)) => {
                        emit(&shared, ClientEvent::Error(format!("Connection failed: {e}")));
                        None
                    }
                    Err(_elapsed) => {
                        emit(&shared, ClientEvent::Error("Connection attempt timed out".to_string()));
                        None
                    }
                }
            }
            _ = manual.changed() => None,
        };

        if *manual.borrow() {
            break;
        }

        if let Some(ws) = connected {
            attempts = 0;
            metrics::counter!("vendwatch_stream_connects_total").increment(1);

            // Install the writer and flush the queue before announcing the
            // state, so a send() racing the transition cannot slip between.
            let (writer_tx, writer_rx) = mpsc::unbounded_channel();
            {
                let mut queue = shared.outbound.lock().await;
                while let Some(text) = queue.pop_front() {
                    let _ = writer_tx.send(Message::Text(text));
                }
            }
            *shared.writer.lock().await = Some(writer_tx);
            set_state(&shared, ConnectionState::Connected);
            tracing::info!(url = %shared.config.url, "Stream connected");

            let end = drive_connection(&shared, ws, writer_rx, &mut manual).await;
            *shared.writer.lock().await = None;

            if matches!(end, SessionEnd::Manual) {
                break;
            }
            tracing::warn!(url = %shared.config.url, "Stream connection lost");
        }

        attempts += 1;
        if attempts > shared.config.policy.max_attempts {
            tracing::error!(
                attempts = attempts - 1,
                "Reconnection attempts exhausted, giving up"
            );
            emit(&shared, ClientEvent::GaveUp { attempts: attempts - 1 });
            break;
        }

        let delay = shared.config.policy.delay_with_jitter(attempts);
        tracing::info!(attempt = attempts, delay_ms = delay.as_millis(), "Reconnecting after delay");
        set_state(&shared, ConnectionState::Reconnecting);
        metrics::counter!("vendwatch_stream_reconnects_total").increment(1);

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = manual.changed() => {}
        }
    }

    set_state(&shared, ConnectionState::Disconnected);
}

/// Pump one live connection until it ends.
async fn drive_connection(
    shared: &Shared,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut writer_rx: mpsc::UnboundedReceiver<Message>,
    manual: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut sink, mut stream) = ws.split();

    let mut heartbeat = tokio::time::interval(shared.config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick of a fresh interval resolves immediately; consume it so
    // the first ping goes out one full interval after connect.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => handle_text(shared, text),
                Some(Ok(Message::Binary(_))) => {
                    tracing::warn!("Ignoring unexpected binary frame");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("Server closed the connection");
                    return SessionEnd::Transport;
                }
                Some(Err(e)) => {
                    emit(shared, ClientEvent::Error(format!("Transport error: {e}")));
                    return SessionEnd::Transport;
                }
                None => return SessionEnd::Transport,
            },

            outbound = writer_rx.recv() => {
                if let Some(message) = outbound {
                    if let Err(e) = sink.send(message).await {
                        emit(shared, ClientEvent::Error(format!("Send failed: {e}")));
                        return SessionEnd::Transport;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if let Err(e) = sink.send(Message::Text(Heartbeat::now().encode())).await {
                    emit(shared, ClientEvent::Error(format!("Heartbeat failed: {e}")));
                    return SessionEnd::Transport;
                }
            }

            _ = manual.changed() => {
                if *manual.borrow() {
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::Manual;
                }
            }
        }
    }
}

/// Classify one inbound text frame and notify subscribers.
fn handle_text(shared: &Shared, text: String) {
    let received_at = Utc::now();
    match classify_payload(&text) {
        Classified::Sale(sale) => {
            metrics::counter!("vendwatch_stream_sales_total").increment(1);
            emit(
                shared,
                ClientEvent::Sale {
                    sale,
                    raw: text,
                    received_at,
                },
            );
        }
        Classified::NonSale(_) => {
            emit(shared, ClientEvent::Message { text, received_at });
        }
        Classified::Malformed { reason } => {
            // Invalid sale payloads never reach consumers.
            metrics::counter!("vendwatch_stream_dropped_total").increment(1);
            tracing::warn!(error = %reason, "Dropping malformed sale payload");
        }
    }
}

fn set_state(shared: &Shared, current: ConnectionState) {
    let previous = shared.state.send_replace(current);
    if previous != current {
        tracing::debug!(previous = %previous, current = %current, "Connection state changed");
        emit(shared, ClientEvent::StateChanged { previous, current });
    }
}

fn emit(shared: &Shared, event: ClientEvent) {
    // A send error only means no subscriber is listening right now.
    let _ = shared.events.send(event);
}
