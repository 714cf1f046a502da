//! WebSocket transport channel to the analysis backend.
//!
//! One persistent connection, binary messages only, no envelope:
//!
//! ```text
//! client ──[ JPEG bytes ]──► backend      (one message per sampled frame)
//! client ◄──[ JPEG bytes ]── backend      (one message per processed frame)
//! ```
//!
//! There is no correlation between outbound and inbound messages.
//! A background task owns the socket and drives its read and write
//! halves independently, so a peer that stops reading never holds up
//! inbound delivery or a close. Callers talk to it through a
//! bounded hand-off queue and receive [`TransportEvent`]s on an mpsc
//! stream. The socket is closed on every exit path: explicit
//! [`close`](FrameTransport::close), drop of the [`TransportChannel`],
//! or a connection error.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

use crate::stream::types::{ConnectionState, SendOutcome};

// ── Constants ────────────────────────────────────────────────────

/// Frames the writer task may hold before sends are refused.
const OUTBOUND_QUEUE: usize = 2;

/// Inbound events buffered before the socket reader waits.
const EVENT_QUEUE: usize = 64;

/// How long a close handshake may wait on a peer that is not reading.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// ── TransportEvent ───────────────────────────────────────────────

/// Observable events of a transport channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection was established.
    Opened,
    /// The connection terminated gracefully (either side).
    Closed,
    /// The connection terminated abnormally. Treat as closed.
    Errored(String),
    /// A binary payload arrived.
    Message(Bytes),
}

/// Receiving half of a channel's event stream.
pub type TransportEvents = mpsc::Receiver<TransportEvent>;

// ── FrameTransport ───────────────────────────────────────────────

/// The operations the streaming controller needs from a transport.
pub trait FrameTransport: Send + Sync + 'static {
    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Hand `payload` to the connection. Never blocks or fails; returns
    /// [`SendOutcome::Refused`] when the payload could not be accepted.
    fn send(&self, payload: Bytes) -> SendOutcome;

    /// Close the connection. Idempotent.
    fn close(&self);
}

// ── TransportChannel ─────────────────────────────────────────────

/// WebSocket-backed [`FrameTransport`].
pub struct TransportChannel {
    endpoint: String,
    state: Arc<AtomicU8>,
    outbound: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    closed: AtomicBool,
    _guard: DropGuard,
}

impl TransportChannel {
    /// Start connecting to `endpoint` immediately.
    ///
    /// Returns the channel and its event stream. The first event is
    /// [`TransportEvent::Opened`] or, if the connection could not be
    /// established, [`TransportEvent::Errored`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(endpoint: impl Into<String>) -> (Self, TransportEvents) {
        let endpoint = endpoint.into();
        let state = Arc::new(AtomicU8::new(ConnectionState::Connecting as u8));
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
        let cancel = CancellationToken::new();

        tokio::spawn(run_connection(
            endpoint.clone(),
            Arc::clone(&state),
            outbound_rx,
            event_tx,
            cancel.clone(),
        ));

        let channel = Self {
            endpoint,
            state,
            outbound: outbound_tx,
            _guard: cancel.clone().drop_guard(),
            cancel,
            closed: AtomicBool::new(false),
        };
        (channel, event_rx)
    }

    /// The backend address this channel targets.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl FrameTransport for TransportChannel {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn send(&self, payload: Bytes) -> SendOutcome {
        if !self.state().is_open() {
            trace!("send refused: connection not open");
            return SendOutcome::Refused;
        }
        match self.outbound.try_send(payload) {
            Ok(()) => SendOutcome::Sent,
            Err(e) => {
                trace!("send refused: {e}");
                SendOutcome::Refused
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(endpoint = %self.endpoint, "closing transport");
        self.state
            .store(ConnectionState::Closed as u8, Ordering::SeqCst);
        self.cancel.cancel();
    }
}

// ── Connection task ──────────────────────────────────────────────

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;
type WsSource = futures::stream::SplitStream<WsStream>;

async fn run_connection(
    endpoint: String,
    state: Arc<AtomicU8>,
    outbound: mpsc::Receiver<Bytes>,
    events: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
) {
    debug!(%endpoint, "connecting");
    let connected = tokio::select! {
        _ = cancel.cancelled() => {
            state.store(ConnectionState::Closed as u8, Ordering::SeqCst);
            let _ = events.send(TransportEvent::Closed).await;
            return;
        }
        result = connect_async(endpoint.as_str()) => result,
    };

    let ws = match connected {
        Ok((ws, _response)) => ws,
        Err(e) => {
            warn!(%endpoint, "connection failed: {e}");
            state.store(ConnectionState::Closed as u8, Ordering::SeqCst);
            let _ = events.send(TransportEvent::Errored(e.to_string())).await;
            return;
        }
    };

    // A close requested while the handshake was finishing wins.
    let opened = state.compare_exchange(
        ConnectionState::Connecting as u8,
        ConnectionState::Open as u8,
        Ordering::SeqCst,
        Ordering::SeqCst,
    );
    if cancel.is_cancelled() || opened.is_err() {
        state.store(ConnectionState::Closed as u8, Ordering::SeqCst);
        let (sink, _) = ws.split();
        close_sink(sink).await;
        let _ = events.send(TransportEvent::Closed).await;
        return;
    }

    info!(%endpoint, "websocket connected");
    let _ = events.send(TransportEvent::Opened).await;

    // Either half ending takes the other one down with it.
    let connection = cancel.child_token();
    let (sink, stream) = ws.split();
    let (written, read) = tokio::join!(
        write_frames(sink, outbound, &state, connection.clone()),
        read_frames(stream, &events, &state, connection),
    );

    match written.and(read) {
        Ok(()) => {
            info!(%endpoint, "websocket disconnected");
            let _ = events.send(TransportEvent::Closed).await;
        }
        Err(reason) => {
            warn!(%endpoint, "websocket error: {reason}");
            let _ = events.send(TransportEvent::Errored(reason)).await;
        }
    }
}

/// Drain the outbound queue into the socket. Every write is raced
/// against `connection`, so a peer that stops reading cannot pin the
/// task past a close.
async fn write_frames(
    mut sink: WsSink,
    mut outbound: mpsc::Receiver<Bytes>,
    state: &AtomicU8,
    connection: CancellationToken,
) -> Result<(), String> {
    let outcome = loop {
        let payload = tokio::select! {
            biased;
            _ = connection.cancelled() => break Ok(()),
            payload = outbound.recv() => match payload {
                Some(payload) => payload,
                None => break Ok(()),
            },
        };

        let len = payload.len();
        tokio::select! {
            biased;
            _ = connection.cancelled() => {
                debug!(len, "write abandoned: connection closing");
                break Ok(());
            }
            written = sink.send(Message::Binary(payload)) => match written {
                Ok(()) => trace!(len, "frame written"),
                Err(e) => break Err(e.to_string()),
            },
        }
    };

    state.store(ConnectionState::Closed as u8, Ordering::SeqCst);
    connection.cancel();
    close_sink(sink).await;
    outcome
}

/// Forward inbound binary messages as events until the peer goes away
/// or `connection` is cancelled.
async fn read_frames(
    mut stream: WsSource,
    events: &mpsc::Sender<TransportEvent>,
    state: &AtomicU8,
    connection: CancellationToken,
) -> Result<(), String> {
    let outcome = loop {
        let inbound = tokio::select! {
            biased;
            _ = connection.cancelled() => break Ok(()),
            inbound = stream.next() => inbound,
        };

        match inbound {
            Some(Ok(Message::Binary(data))) => {
                trace!(len = data.len(), "frame received");
                let delivered = tokio::select! {
                    biased;
                    _ = connection.cancelled() => break Ok(()),
                    delivered = events.send(TransportEvent::Message(data)) => delivered,
                };
                if delivered.is_err() {
                    debug!("event stream dropped; closing");
                    break Ok(());
                }
            }
            Some(Ok(Message::Text(text))) => {
                debug!(len = text.len(), "ignoring text message");
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "peer closed connection");
                break Ok(());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break Err(e.to_string()),
            None => break Ok(()),
        }
    };

    state.store(ConnectionState::Closed as u8, Ordering::SeqCst);
    connection.cancel();
    outcome
}

/// Send the close frame, giving up after [`CLOSE_TIMEOUT`] when the peer
/// is not draining the socket. Dropping both halves closes the TCP stream.
async fn close_sink(mut sink: WsSink) {
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => trace!("close handshake: {e}"),
        Err(_) => debug!("close handshake timed out"),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn next_event(events: &mut TransportEvents) -> TransportEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timeout")
            .expect("event stream ended")
    }

    #[tokio::test]
    async fn refuses_while_connecting() {
        // The connection task has not run yet.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (channel, _events) = TransportChannel::connect(format!("ws://{addr}/ws/video"));

        assert_eq!(channel.state(), ConnectionState::Connecting);
        assert_eq!(channel.send(Bytes::from_static(b"frame")), SendOutcome::Refused);
        drop(listener);
    }

    #[tokio::test]
    async fn unreachable_endpoint_errors_and_refuses() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (channel, mut events) = TransportChannel::connect(format!("ws://{addr}/ws/video"));
        assert!(matches!(next_event(&mut events).await, TransportEvent::Errored(_)));
        assert_eq!(channel.state(), ConnectionState::Closed);
        assert_eq!(channel.send(Bytes::from_static(b"frame")), SendOutcome::Refused);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_refuses_after() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (channel, mut events) = TransportChannel::connect(format!("ws://{addr}/ws/video"));

        channel.close();
        channel.close();
        assert_eq!(channel.state(), ConnectionState::Closed);
        assert_eq!(channel.send(Bytes::from_static(b"frame")), SendOutcome::Refused);

        // Closing before the handshake completes ends the stream with Closed.
        assert_eq!(next_event(&mut events).await, TransportEvent::Closed);
    }
}
