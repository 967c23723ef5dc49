//! In-process loopback transport.
//!
//! Every session started on a [`MemoryTransport`] is handed to the paired
//! [`MemoryListener`] as a [`MemoryPeer`], which plays the server: it sees the
//! frames the client sends and decides when the session connects, delivers
//! frames, disconnects, or dies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tether_protocol::Frame;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use url::Url;

use crate::traits::{
    frame_queue, DisconnectReason, EventSink, FrameReceiver, Session, SessionId, Transport,
    TransportError,
};

/// Loopback transport. Cloning shares the same listener.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refuse: Arc<AtomicBool>,
}

/// Receives the server side of each session started on the transport.
#[derive(Debug)]
pub struct MemoryListener {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryTransport {
    /// Create a transport and its listener.
    #[must_use]
    pub fn new() -> (Self, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            peers: tx,
            refuse: Arc::new(AtomicBool::new(false)),
        };
        (transport, MemoryListener { peers: rx })
    }

    /// Make subsequent `start` calls fail (or succeed again).
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

impl Transport for MemoryTransport {
    fn start(&self, url: &Url, events: EventSink) -> Result<Session, TransportError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Other(format!("connection refused: {url}")));
        }

        let (outbound, rx) = frame_queue();
        let (exit_tx, exit_rx) = oneshot::channel::<()>();
        let id = events.session();

        // The session task lives until the peer exits or is dropped.
        let task = tokio::spawn(async move {
            let _ = exit_rx.await;
        });

        let peer = MemoryPeer {
            url: url.clone(),
            events,
            outbound: rx,
            exit: Some(exit_tx),
        };
        self.peers
            .send(peer)
            .map_err(|_| TransportError::Other("memory listener dropped".into()))?;

        debug!(session = %id, %url, "Memory session started");
        Ok(Session::new(id, outbound, task))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl MemoryListener {
    /// Wait for the next session.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// Take the next session if one was started.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers.try_recv().ok()
    }
}

/// The server end of one memory session.
#[derive(Debug)]
pub struct MemoryPeer {
    url: Url,
    events: EventSink,
    outbound: FrameReceiver,
    exit: Option<oneshot::Sender<()>>,
}

impl MemoryPeer {
    /// URL the client asked for.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Session this peer serves.
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.events.session()
    }

    /// Report the session as connected.
    pub fn connect(&self) {
        self.events.notify_connected();
    }

    /// Deliver a frame to the client.
    pub fn deliver(&self, frame: impl AsRef<[u8]>) {
        self.events.notify_message(frame.as_ref().to_vec());
    }

    /// Report a disconnect to the client without ending the session task.
    pub fn disconnect(&self, reason: DisconnectReason) {
        self.events.notify_disconnected(reason);
    }

    /// End the session task without reporting anything.
    pub fn exit(&mut self) {
        if let Some(exit) = self.exit.take() {
            let _ = exit.send(());
        }
    }

    /// Wait for the next frame sent by the client.
    ///
    /// Returns `None` once the client dropped the session.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Take the next frame sent by the client, if any.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.outbound.try_recv().ok()
    }
}
