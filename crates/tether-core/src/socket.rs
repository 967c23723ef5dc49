//! The send path.
//!
//! A [`Socket`] is the view of the live connection handed to every handler
//! callback. It borrows the client's state for the duration of one callback,
//! so it cannot outlive the session it was built from.

use tether_protocol::{events, Message, Payload, ProtocolError, Ref, Serializer, JOIN_REF};
use tether_transport::{Session, SessionId};
use thiserror::Error;
use tracing::{debug, trace};

use crate::metrics;
use crate::refs::RefAllocator;

/// Errors returned by [`Socket::join`], [`Socket::push`] and [`Socket::leave`].
#[derive(Debug, Error)]
pub enum ChannelError {
    /// No live transport session.
    #[error("Not connected")]
    Disconnected,

    /// The first message on a topic was not a join.
    #[error("Not joined to topic: {0}")]
    NotJoined(String),

    /// The topic was already joined on this connection.
    #[error("Already joined to topic: {0}")]
    AlreadyJoined(String),

    /// The message could not be encoded.
    #[error("Encoding failed: {0}")]
    Encode(#[from] ProtocolError),
}

/// Borrowed view of the connection, passed to handler callbacks.
pub struct Socket<'a> {
    session: Option<&'a Session>,
    refs: &'a mut RefAllocator,
    serializer: &'a dyn Serializer,
}

impl<'a> Socket<'a> {
    pub(crate) fn new(
        session: Option<&'a Session>,
        refs: &'a mut RefAllocator,
        serializer: &'a dyn Serializer,
    ) -> Self {
        Self {
            session,
            refs,
            serializer,
        }
    }

    /// The current session, if connected.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.map(Session::id)
    }

    /// Check if a transport session is live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.live_session().is_some()
    }

    /// The serializer frames are encoded with.
    #[must_use]
    pub fn serializer(&self) -> &dyn Serializer {
        self.serializer
    }

    /// The last ref allocated on a topic during this connection.
    #[must_use]
    pub fn last_ref(&self, topic: &str) -> Option<Ref> {
        self.refs.current(topic)
    }

    /// Join a topic. Resolves to ref 1 on success.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AlreadyJoined`] if the topic was joined on this
    /// connection, or [`ChannelError::Disconnected`] if not connected.
    pub fn join(&mut self, topic: &str, payload: Payload) -> Result<Ref, ChannelError> {
        self.push(topic, events::JOIN, payload)
    }

    /// Leave a topic.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotJoined`] if nothing was ever sent on the
    /// topic during this connection.
    pub fn leave(&mut self, topic: &str, payload: Payload) -> Result<Ref, ChannelError> {
        self.push(topic, events::LEAVE, payload)
    }

    /// Send an event on a topic.
    ///
    /// Returns the ref the server will echo in its reply.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Disconnected`] without allocating a ref if not
    /// connected, [`ChannelError::NotJoined`] if this would be the first
    /// message on the topic and it is not a join, and
    /// [`ChannelError::AlreadyJoined`] for a second join on the topic.
    pub fn push(
        &mut self,
        topic: &str,
        event: &str,
        payload: Payload,
    ) -> Result<Ref, ChannelError> {
        let Some(session) = self.live_session() else {
            metrics::record_rejected("disconnected");
            return Err(ChannelError::Disconnected);
        };

        let reference = self.refs.next_ref(topic);
        let is_join = event == events::JOIN;

        if !is_join && reference == JOIN_REF {
            self.refs.discard(topic);
            metrics::record_rejected("not_joined");
            debug!(topic, event, "Rejected push to unjoined topic");
            return Err(ChannelError::NotJoined(topic.to_string()));
        }
        if is_join && reference > JOIN_REF {
            metrics::record_rejected("already_joined");
            debug!(topic, reference, "Rejected duplicate join");
            return Err(ChannelError::AlreadyJoined(topic.to_string()));
        }

        let message = Message::new(topic, event, payload, Some(reference));
        let frame = self.serializer.encode(&message)?;
        let size = frame.len();

        session
            .outbound()
            .send(frame)
            .map_err(|_| ChannelError::Disconnected)?;

        metrics::record_frame(size, "outbound");
        trace!(session = %session.id(), topic, event, reference, bytes = size, "Queued frame");
        Ok(reference)
    }

    pub(crate) fn forget(&mut self, topic: &str) {
        if self.refs.discard(topic) {
            trace!(topic, "Discarded ref state");
        }
    }

    fn live_session(&self) -> Option<&'a Session> {
        self.session.filter(|s| !s.outbound().is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_protocol::{Frame, JsonSerializer};
    use tether_transport::{frame_queue, FrameReceiver};

    fn session() -> (Session, FrameReceiver) {
        let (outbound, rx) = frame_queue();
        let task = tokio::spawn(async {});
        (Session::new(SessionId::generate(), outbound, task), rx)
    }

    fn decode(frame: Frame) -> Message {
        JsonSerializer.decode(frame.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_join_then_push() {
        let (session, mut rx) = session();
        let mut refs = RefAllocator::new();
        let mut socket = Socket::new(Some(&session), &mut refs, &JsonSerializer);

        assert_eq!(socket.join("room:1", Payload::new()).unwrap(), 1);
        assert_eq!(socket.push("room:1", "msg", Payload::new()).unwrap(), 2);

        let join = decode(rx.try_recv().unwrap());
        assert_eq!(join.event, events::JOIN);
        assert_eq!(join.reference, Some(1));

        let push = decode(rx.try_recv().unwrap());
        assert_eq!(push.event, "msg");
        assert_eq!(push.reference, Some(2));
    }

    #[tokio::test]
    async fn test_push_before_join_resets_topic() {
        let (session, mut rx) = session();
        let mut refs = RefAllocator::new();
        let mut socket = Socket::new(Some(&session), &mut refs, &JsonSerializer);

        assert!(matches!(
            socket.push("room:2", "msg", Payload::new()),
            Err(ChannelError::NotJoined(topic)) if topic == "room:2"
        ));
        assert_eq!(socket.last_ref("room:2"), None);
        assert!(rx.try_recv().is_err());

        assert_eq!(socket.join("room:2", Payload::new()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_leave_joined_topic() {
        let (session, mut rx) = session();
        let mut refs = RefAllocator::new();
        let mut socket = Socket::new(Some(&session), &mut refs, &JsonSerializer);

        socket.join("room:1", Payload::new()).unwrap();
        assert_eq!(socket.leave("room:1", Payload::new()).unwrap(), 2);

        rx.try_recv().unwrap();
        let leave = decode(rx.try_recv().unwrap());
        assert_eq!(leave.event, events::LEAVE);
        assert_eq!(leave.reference, Some(2));
    }

    #[tokio::test]
    async fn test_leave_unjoined_topic() {
        let (session, _rx) = session();
        let mut refs = RefAllocator::new();
        let mut socket = Socket::new(Some(&session), &mut refs, &JsonSerializer);

        assert!(matches!(
            socket.leave("room:3", Payload::new()),
            Err(ChannelError::NotJoined(_))
        ));
    }

    #[tokio::test]
    async fn test_double_join_keeps_advanced_ref() {
        let (session, mut rx) = session();
        let mut refs = RefAllocator::new();
        let mut socket = Socket::new(Some(&session), &mut refs, &JsonSerializer);

        socket.join("room:1", Payload::new()).unwrap();
        assert!(matches!(
            socket.join("room:1", Payload::new()),
            Err(ChannelError::AlreadyJoined(_))
        ));
        assert_eq!(socket.last_ref("room:1"), Some(2));
        assert_eq!(socket.push("room:1", "msg", Payload::new()).unwrap(), 3);

        // Only the first join and the push reached the transport.
        assert!(rx.try_recv().is_ok());
        assert_eq!(decode(rx.try_recv().unwrap()).reference, Some(3));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_allocates_nothing() {
        let mut refs = RefAllocator::new();
        let mut socket = Socket::new(None, &mut refs, &JsonSerializer);

        assert!(!socket.is_connected());
        assert!(matches!(
            socket.join("room:1", Payload::new()),
            Err(ChannelError::Disconnected)
        ));
        assert!(refs.is_empty());
    }

    #[tokio::test]
    async fn test_dead_session_counts_as_disconnected() {
        let (session, rx) = session();
        drop(rx);
        let mut refs = RefAllocator::new();
        let mut socket = Socket::new(Some(&session), &mut refs, &JsonSerializer);

        assert!(socket.session_id().is_some());
        assert!(!socket.is_connected());
        assert!(matches!(
            socket.join("room:1", Payload::new()),
            Err(ChannelError::Disconnected)
        ));
        assert!(refs.is_empty());
    }
}
