//! Transport abstraction traits.
//!
//! A transport runs each session in its own task. It reports lifecycle and
//! inbound frames through an [`EventSink`] and takes outbound frames from a
//! [`FrameReceiver`]. The task's [`JoinHandle`] lets the owner observe the
//! session ending.

use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tether_protocol::Frame;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;
use url::Url;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a process-unique session ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(SESSION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer closed the connection.
    Closed {
        /// Close code, if the peer sent one.
        code: Option<u16>,
        /// Close reason text.
        reason: String,
    },
    /// The connection could not be established.
    HandshakeFailed(String),
    /// The connection failed while open.
    Error(String),
    /// The transport task ended without reporting a disconnect.
    TransportExited(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Closed { code: Some(code), reason } => {
                write!(f, "closed ({code}): {reason}")
            }
            DisconnectReason::Closed { code: None, reason } => write!(f, "closed: {reason}"),
            DisconnectReason::HandshakeFailed(e) => write!(f, "handshake failed: {e}"),
            DisconnectReason::Error(e) => write!(f, "connection error: {e}"),
            DisconnectReason::TransportExited(e) => write!(f, "transport exited: {e}"),
        }
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The URL cannot be used by this transport.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The outbound queue is closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// A notification from a transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The session is connected and can carry frames.
    Connected,
    /// The session ended.
    Disconnected(DisconnectReason),
    /// A frame arrived.
    Frame(Bytes),
}

/// Sending half of the event channel shared by all sessions of a client.
pub type EventSender = mpsc::UnboundedSender<(SessionId, TransportEvent)>;

/// Receiving half of the event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<(SessionId, TransportEvent)>;

/// Create the event channel a client listens on.
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Notification entry points handed to a transport for one session.
///
/// Every event is tagged with the session it belongs to so the receiver can
/// discard notifications from sessions it has already given up on.
#[derive(Debug, Clone)]
pub struct EventSink {
    session: SessionId,
    tx: EventSender,
}

impl EventSink {
    /// Create a sink for a session.
    #[must_use]
    pub fn new(session: SessionId, tx: EventSender) -> Self {
        Self { session, tx }
    }

    /// The session this sink reports for.
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Report that the session is connected.
    ///
    /// Returns `false` if nobody is listening anymore.
    pub fn notify_connected(&self) -> bool {
        self.notify(TransportEvent::Connected)
    }

    /// Report that the session ended.
    pub fn notify_disconnected(&self, reason: DisconnectReason) -> bool {
        self.notify(TransportEvent::Disconnected(reason))
    }

    /// Report an inbound frame.
    pub fn notify_message(&self, data: impl Into<Bytes>) -> bool {
        self.notify(TransportEvent::Frame(data.into()))
    }

    fn notify(&self, event: TransportEvent) -> bool {
        trace!(session = %self.session, ?event, "Transport event");
        self.tx.send((self.session, event)).is_ok()
    }
}

/// Outbound frame queue feeding a session task.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<Frame>,
}

/// Receiving end of the outbound frame queue, owned by the session task.
pub type FrameReceiver = mpsc::UnboundedReceiver<Frame>;

/// Create an outbound frame queue.
#[must_use]
pub fn frame_queue() -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FrameSender { tx }, rx)
}

impl FrameSender {
    /// Queue a frame for sending. Never waits on the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the session task has gone away.
    pub fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Check if the session task has dropped its end of the queue.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A live transport session.
///
/// Dropping the session closes its outbound queue, which tells the session
/// task to shut the connection down.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    outbound: FrameSender,
    task: JoinHandle<()>,
}

impl Session {
    /// Assemble a session from its parts.
    #[must_use]
    pub fn new(id: SessionId, outbound: FrameSender, task: JoinHandle<()>) -> Self {
        Self { id, outbound, task }
    }

    /// Get the session ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get the outbound frame queue.
    #[must_use]
    pub fn outbound(&self) -> &FrameSender {
        &self.outbound
    }

    /// Get the session task handle, resolved when the task ends.
    pub fn task_mut(&mut self) -> &mut JoinHandle<()> {
        &mut self.task
    }
}

/// A transport that can open client sessions.
pub trait Transport: Send + Sync {
    /// Start a session to `url`.
    ///
    /// Must not wait on the network: the connection is established by the
    /// spawned session task, which reports through `events`. Must be called
    /// from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be started at all.
    fn start(&self, url: &Url, events: EventSink) -> Result<Session, TransportError>;

    /// Get the transport name (e.g., "websocket", "memory").
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_generation() {
        let id1 = SessionId::generate();
        let id2 = SessionId::generate();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("session_"));
    }

    #[test]
    fn test_event_sink_tags_session() {
        let (tx, mut rx) = event_channel();
        let sink = EventSink::new(SessionId::generate(), tx);

        assert!(sink.notify_connected());
        assert!(sink.notify_message(b"hello".to_vec()));

        let (id, event) = rx.try_recv().unwrap();
        assert_eq!(id, sink.session());
        assert_eq!(event, TransportEvent::Connected);

        let (_, event) = rx.try_recv().unwrap();
        assert_eq!(event, TransportEvent::Frame(Bytes::from_static(b"hello")));

        drop(rx);
        assert!(!sink.notify_connected());
    }

    #[test]
    fn test_frame_sender_closed() {
        let (tx, rx) = frame_queue();
        assert!(!tx.is_closed());
        tx.send(Frame::Text("x".into())).unwrap();

        drop(rx);
        assert!(tx.is_closed());
        assert!(matches!(
            tx.send(Frame::Text("x".into())),
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_disconnect_reason_display() {
        let reason = DisconnectReason::Closed {
            code: Some(1000),
            reason: "bye".into(),
        };
        assert_eq!(reason.to_string(), "closed (1000): bye");
    }
}
