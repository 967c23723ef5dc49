//! The callback contract implemented by applications.
//!
//! A [`ChannelHandler`] is the application's state. The client calls exactly
//! one of its methods per event and applies the returned [`Action`].

use std::fmt;
use tether_protocol::{Payload, Ref, PROTOCOL_VERSION, VERSION_PARAM};
use tether_transport::DisconnectReason;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::warn;
use url::Url;

use crate::client::ClientHandle;
use crate::socket::Socket;

/// What the client does after a callback returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Keep going.
    Continue,
    /// Establish a transport session if none is live.
    Connect,
    /// Terminate the client.
    Stop(StopReason),
}

/// Why a client stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Ordinary shutdown.
    Normal,
    /// Stopped at the request of the application.
    Shutdown(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Normal => write!(f, "normal"),
            StopReason::Shutdown(reason) => write!(f, "shutdown: {reason}"),
        }
    }
}

/// Returned by [`ChannelHandler::init`] to refuse startup.
#[derive(Debug, Error)]
#[error("Handler refused to start: {0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Create a new error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Where to connect: a socket URL and extra query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
    params: Vec<(String, String)>,
}

impl Endpoint {
    /// Parse an endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?))
    }

    /// Create an endpoint from a URL.
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self {
            base,
            params: Vec::new(),
        }
    }

    /// Add a query parameter, e.g. an auth token.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// The URL to connect to, with the parameters appended. `vsn` is added
    /// unless the base URL or a parameter already sets it.
    #[must_use]
    pub fn url(&self) -> Url {
        let has_version = self.params.iter().any(|(key, _)| key == VERSION_PARAM)
            || self.base.query_pairs().any(|(key, _)| key == VERSION_PARAM);
        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &self.params {
                query.append_pair(key, value);
            }
            if !has_version {
                query.append_pair(VERSION_PARAM, &PROTOCOL_VERSION.to_string());
            }
        }
        url
    }
}

/// Result of [`ChannelHandler::init`].
#[derive(Debug)]
pub struct Startup<H> {
    pub(crate) handler: H,
    pub(crate) endpoint: Endpoint,
    pub(crate) connect: bool,
}

impl<H> Startup<H> {
    /// Start and connect right away.
    #[must_use]
    pub fn connect(handler: H, endpoint: Endpoint) -> Self {
        Self {
            handler,
            endpoint,
            connect: true,
        }
    }

    /// Start disconnected; a later [`Action::Connect`] opens the session.
    #[must_use]
    pub fn idle(handler: H, endpoint: Endpoint) -> Self {
        Self {
            handler,
            endpoint,
            connect: false,
        }
    }
}

/// Answers a [`ClientHandle::call`]. May be kept and answered later.
#[derive(Debug)]
pub struct Responder<R> {
    tx: oneshot::Sender<R>,
}

impl<R> Responder<R> {
    pub(crate) fn new(tx: oneshot::Sender<R>) -> Self {
        Self { tx }
    }

    /// Send the reply. Returns `false` if the caller stopped waiting.
    pub fn reply(self, reply: R) -> bool {
        self.tx.send(reply).is_ok()
    }
}

/// Application callbacks.
///
/// Every method but [`init`](ChannelHandler::init) has a default that keeps
/// going. Callbacks run on the client task and must not block.
#[allow(unused_variables)]
pub trait ChannelHandler: Send + Sized + 'static {
    /// Startup argument.
    type Args: Send;
    /// Request type for [`ClientHandle::call`].
    type Call: Send + 'static;
    /// Reply type for [`ClientHandle::call`].
    type Reply: Send + 'static;
    /// Message type for [`ClientHandle::notify`].
    type Info: Send + 'static;

    /// Build the handler and decide where and whether to connect.
    ///
    /// `handle` reaches this client's mailbox; it may be kept to schedule
    /// work for later.
    ///
    /// # Errors
    ///
    /// Returning an error aborts [`Client::start`](crate::Client::start).
    fn init(args: Self::Args, handle: ClientHandle<Self>) -> Result<Startup<Self>, HandlerError>;

    /// The transport session is connected.
    fn handle_connected(&mut self, socket: &mut Socket<'_>) -> Action {
        Action::Continue
    }

    /// The transport session was lost. All topics must be joined again.
    fn handle_disconnected(&mut self, reason: &DisconnectReason) -> Action {
        Action::Continue
    }

    /// The server accepted a join.
    fn handle_joined(&mut self, topic: &str, response: Payload, socket: &mut Socket<'_>) -> Action {
        Action::Continue
    }

    /// The server rejected a join.
    fn handle_join_error(
        &mut self,
        topic: &str,
        response: Payload,
        socket: &mut Socket<'_>,
    ) -> Action {
        Action::Continue
    }

    /// The server closed the channel, or it crashed.
    fn handle_channel_closed(
        &mut self,
        topic: &str,
        payload: Payload,
        socket: &mut Socket<'_>,
    ) -> Action {
        Action::Continue
    }

    /// A server push on a topic.
    fn handle_message(
        &mut self,
        topic: &str,
        event: &str,
        payload: Payload,
        socket: &mut Socket<'_>,
    ) -> Action {
        Action::Continue
    }

    /// A reply to a message sent with ref `reference`.
    fn handle_reply(
        &mut self,
        topic: &str,
        reference: Ref,
        payload: Payload,
        socket: &mut Socket<'_>,
    ) -> Action {
        Action::Continue
    }

    /// A message sent with [`ClientHandle::notify`].
    fn handle_info(&mut self, info: Self::Info, socket: &mut Socket<'_>) -> Action {
        warn!("Unhandled info message");
        Action::Continue
    }

    /// A request sent with [`ClientHandle::call`].
    ///
    /// Dropping `responder` without replying fails the call.
    fn handle_call(
        &mut self,
        request: Self::Call,
        responder: Responder<Self::Reply>,
        socket: &mut Socket<'_>,
    ) -> Action {
        warn!("Unhandled call");
        Action::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let endpoint = Endpoint::parse("ws://localhost:4000/socket/websocket")
            .unwrap()
            .with_param("token", "abc 123");

        assert_eq!(
            endpoint.url().as_str(),
            "ws://localhost:4000/socket/websocket?token=abc+123&vsn=1.0.0"
        );
    }

    #[test]
    fn test_endpoint_keeps_existing_query() {
        let endpoint = Endpoint::parse("ws://localhost/socket?tenant=a").unwrap();
        assert_eq!(
            endpoint.url().as_str(),
            "ws://localhost/socket?tenant=a&vsn=1.0.0"
        );
    }

    #[test]
    fn test_endpoint_explicit_version() {
        let endpoint = Endpoint::parse("ws://localhost/socket")
            .unwrap()
            .with_param("vsn", "2.0.0");
        assert_eq!(endpoint.url().as_str(), "ws://localhost/socket?vsn=2.0.0");

        let endpoint = Endpoint::parse("ws://localhost/socket?vsn=2.0.0").unwrap();
        assert_eq!(endpoint.url().as_str(), "ws://localhost/socket?vsn=2.0.0");
    }

    #[test]
    fn test_responder() {
        let (tx, mut rx) = oneshot::channel();
        assert!(Responder::new(tx).reply(5));
        assert_eq!(rx.try_recv().unwrap(), 5);

        let (tx, rx) = oneshot::channel::<u8>();
        drop(rx);
        assert!(!Responder::new(tx).reply(5));
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::Normal.to_string(), "normal");
        assert_eq!(
            StopReason::Shutdown("bye".into()).to_string(),
            "shutdown: bye"
        );
    }
}
