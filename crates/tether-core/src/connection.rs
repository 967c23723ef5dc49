//! Connection lifecycle.
//!
//! Owns the transport, the current session and the ref table. At most one
//! session is live at a time, and losing it wipes every topic's refs.

use std::future::Future;
use std::sync::Arc;
use tether_protocol::{Message, ProtocolError, Serializer};
use tether_transport::{EventSender, EventSink, Session, SessionId, Transport, TransportError};
use tokio::task::JoinError;
use tracing::{debug, info};

use crate::handler::Endpoint;
use crate::metrics;
use crate::refs::RefAllocator;
use crate::socket::Socket;

/// Connection state held by the client task.
pub(crate) struct Connection {
    transport: Box<dyn Transport>,
    endpoint: Endpoint,
    events: EventSender,
    serializer: Arc<dyn Serializer>,
    session: Option<Session>,
    refs: RefAllocator,
}

impl Connection {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        endpoint: Endpoint,
        events: EventSender,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        Self {
            transport,
            endpoint,
            events,
            serializer,
            session: None,
            refs: RefAllocator::new(),
        }
    }

    /// Start a session unless one is already live.
    pub(crate) fn connect(&mut self) -> Result<(), TransportError> {
        if let Some(session) = &self.session {
            debug!(session = %session.id(), "Connect requested while session is live");
            return Ok(());
        }

        let url = self.endpoint.url();
        let sink = EventSink::new(SessionId::generate(), self.events.clone());
        let session = self.transport.start(&url, sink)?;

        info!(
            session = %session.id(),
            transport = self.transport.name(),
            serializer = self.serializer.name(),
            "Connecting to {}",
            url
        );
        metrics::record_session();
        self.session = Some(session);
        Ok(())
    }

    /// Whether `id` is the live session.
    pub(crate) fn is_current(&self, id: SessionId) -> bool {
        self.session.as_ref().is_some_and(|s| s.id() == id)
    }

    /// Forget the session and every topic's refs.
    pub(crate) fn reset(&mut self) -> Option<SessionId> {
        self.refs.clear();
        let session = self.session.take()?;
        debug!(session = %session.id(), "Session reset");
        Some(session.id())
    }

    /// Reset after the session was lost rather than closed on purpose.
    pub(crate) fn lost(&mut self) {
        if self.reset().is_some() {
            metrics::record_disconnect();
        }
    }

    /// Resolves when the live session's task ends. Pending while disconnected.
    pub(crate) fn exited(
        &mut self,
    ) -> impl Future<Output = (SessionId, Result<(), JoinError>)> + '_ {
        let session = self.session.as_mut();
        async move {
            match session {
                Some(session) => {
                    let id = session.id();
                    (id, session.task_mut().await)
                }
                None => std::future::pending().await,
            }
        }
    }

    pub(crate) fn decode(&self, data: &[u8]) -> Result<Message, ProtocolError> {
        self.serializer.decode(data)
    }

    pub(crate) fn socket(&mut self) -> Socket<'_> {
        Socket::new(self.session.as_ref(), &mut self.refs, self.serializer.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::metrics::{
        Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::sync::atomic::{AtomicU64, Ordering};
    use tether_protocol::{JsonSerializer, Payload};
    use tether_transport::{event_channel, MemoryListener, MemoryTransport};

    /// Counts `tether_disconnects_total` increments.
    #[derive(Default)]
    struct DisconnectCounter(Arc<AtomicU64>);

    impl Recorder for DisconnectCounter {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            if key.name() == crate::metrics::names::DISCONNECTS_TOTAL {
                Counter::from_arc(self.0.clone())
            } else {
                Counter::noop()
            }
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    impl DisconnectCounter {
        fn count(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn connection() -> (Connection, MemoryListener) {
        let (transport, listener) = MemoryTransport::new();
        let (events, _rx) = event_channel();
        let conn = Connection::new(
            Box::new(transport),
            Endpoint::parse("ws://memory/socket").unwrap(),
            events,
            Arc::new(JsonSerializer),
        );
        (conn, listener)
    }

    #[tokio::test]
    async fn test_lost_session_counts_as_disconnect() {
        let counter = DisconnectCounter::default();
        let (mut conn, _listener) = connection();

        conn.connect().unwrap();
        conn.socket().join("room:1", Payload::new()).unwrap();
        ::metrics::with_local_recorder(&counter, || conn.lost());

        assert_eq!(counter.count(), 1);
        assert_eq!(conn.socket().last_ref("room:1"), None);
        assert!(!conn.socket().is_connected());
    }

    #[tokio::test]
    async fn test_reset_does_not_count_as_disconnect() {
        let counter = DisconnectCounter::default();
        let (mut conn, _listener) = connection();

        conn.connect().unwrap();
        let id = ::metrics::with_local_recorder(&counter, || conn.reset());

        assert!(id.is_some());
        assert_eq!(counter.count(), 0);
        assert_eq!(conn.reset(), None);
    }
}
