//! The client task and its public handles.
//!
//! All state lives in one task that processes, in order, transport events,
//! commands from [`ClientHandle`]s and the end of the transport task. Every
//! step calls one handler method and applies the [`Action`] it returns.

use std::fmt;
use std::sync::Arc;
use tether_protocol::{JsonSerializer, Serializer};
use tether_transport::{
    event_channel, DisconnectReason, EventReceiver, SessionId, Transport, TransportError,
    TransportEvent,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::connection::Connection;
use crate::dispatch::{classify, dispatch};
use crate::handler::{Action, ChannelHandler, HandlerError, Responder, StopReason};
use crate::metrics;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The handler refused to start.
    #[error(transparent)]
    Init(#[from] HandlerError),

    /// A transport session could not be started.
    #[error("Connect failed: {0}")]
    Connect(#[from] TransportError),

    /// The client is no longer running.
    #[error("Client terminated")]
    Terminated,

    /// The handler dropped a call without replying.
    #[error("No reply to call")]
    NoReply,

    /// The client task panicked.
    #[error("Client task failed: {0}")]
    Panicked(String),
}

/// Client options.
#[derive(Clone)]
pub struct ClientOptions {
    /// Serializer for frames on the wire.
    pub serializer: Arc<dyn Serializer>,
}

impl ClientOptions {
    /// Use a different serializer.
    #[must_use]
    pub fn with_serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            serializer: Arc::new(JsonSerializer),
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("serializer", &self.serializer.name())
            .finish()
    }
}

enum Command<H: ChannelHandler> {
    Call(H::Call, Responder<H::Reply>),
    Info(H::Info),
    Stop(StopReason),
}

/// Cloneable handle to a running client's mailbox.
pub struct ClientHandle<H: ChannelHandler> {
    tx: mpsc::UnboundedSender<Command<H>>,
}

impl<H: ChannelHandler> Clone for ClientHandle<H> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<H: ChannelHandler> fmt::Debug for ClientHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<H: ChannelHandler> ClientHandle<H> {
    /// Send a request to [`ChannelHandler::handle_call`] and wait for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Terminated`] if the client is gone and
    /// [`ClientError::NoReply`] if the handler dropped the request.
    pub async fn call(&self, request: H::Call) -> Result<H::Reply, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Call(request, Responder::new(tx)))?;
        rx.await.map_err(|_| ClientError::NoReply)
    }

    /// Deliver a message to [`ChannelHandler::handle_info`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Terminated`] if the client is gone.
    pub fn notify(&self, info: H::Info) -> Result<(), ClientError> {
        self.send(Command::Info(info))
    }

    /// Ask the client to stop.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Terminated`] if the client is already gone.
    pub fn stop(&self, reason: StopReason) -> Result<(), ClientError> {
        self.send(Command::Stop(reason))
    }

    fn send(&self, command: Command<H>) -> Result<(), ClientError> {
        self.tx.send(command).map_err(|_| ClientError::Terminated)
    }
}

/// A running channel client.
pub struct Client<H: ChannelHandler> {
    handle: ClientHandle<H>,
    task: JoinHandle<Result<StopReason, ClientError>>,
}

impl<H: ChannelHandler> Client<H> {
    /// Initialise the handler and spawn the client task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Init`] if [`ChannelHandler::init`] refuses.
    pub fn start(
        args: H::Args,
        transport: impl Transport + 'static,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let (tx, commands) = mpsc::unbounded_channel();
        let handle = ClientHandle { tx };

        let startup = H::init(args, handle.clone())?;
        let (events_tx, events) = event_channel();
        let conn = Connection::new(
            Box::new(transport),
            startup.endpoint,
            events_tx,
            options.serializer,
        );

        let actor = Actor {
            handler: startup.handler,
            conn,
            commands,
            events,
        };
        let task = tokio::spawn(actor.run(startup.connect));

        Ok(Self { handle, task })
    }

    /// Get a handle to the client's mailbox.
    #[must_use]
    pub fn handle(&self) -> ClientHandle<H> {
        self.handle.clone()
    }

    /// Wait for the client to terminate.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connect`] if a session could not be started, or
    /// [`ClientError::Panicked`] if a callback panicked.
    pub async fn wait(self) -> Result<StopReason, ClientError> {
        self.task
            .await
            .map_err(|e| ClientError::Panicked(e.to_string()))?
    }
}

struct Actor<H: ChannelHandler> {
    handler: H,
    conn: Connection,
    commands: mpsc::UnboundedReceiver<Command<H>>,
    events: EventReceiver,
}

impl<H: ChannelHandler> Actor<H> {
    async fn run(mut self, connect: bool) -> Result<StopReason, ClientError> {
        if connect {
            self.conn.connect()?;
        }

        loop {
            let action = tokio::select! {
                biased;
                Some((id, event)) = self.events.recv() => self.on_event(id, event),
                Some(command) = self.commands.recv() => self.on_command(command),
                (id, exit) = self.conn.exited() => self.on_exit(id, exit),
                else => Action::Stop(StopReason::Normal),
            };

            match action {
                Action::Continue => {}
                Action::Connect => self.conn.connect()?,
                Action::Stop(reason) => {
                    info!(%reason, "Client stopping");
                    self.conn.reset();
                    return Ok(reason);
                }
            }
        }
    }

    fn on_event(&mut self, id: SessionId, event: TransportEvent) -> Action {
        if !self.conn.is_current(id) {
            debug!(session = %id, ?event, "Ignoring event from stale session");
            return Action::Continue;
        }

        match event {
            TransportEvent::Connected => {
                info!(session = %id, "Connected");
                self.handler.handle_connected(&mut self.conn.socket())
            }
            TransportEvent::Disconnected(reason) => self.disconnected(id, reason),
            TransportEvent::Frame(data) => {
                metrics::record_frame(data.len(), "inbound");
                match self.conn.decode(&data) {
                    Ok(message) => {
                        trace!(
                            session = %id,
                            topic = %message.topic,
                            event = %message.event,
                            reference = ?message.reference,
                            "Received message"
                        );
                        dispatch(&mut self.handler, classify(message), &mut self.conn.socket())
                    }
                    Err(e) => {
                        warn!(session = %id, error = %e, "Dropping undecodable frame");
                        metrics::record_decode_error();
                        Action::Continue
                    }
                }
            }
        }
    }

    fn on_exit(&mut self, id: SessionId, exit: Result<(), JoinError>) -> Action {
        let detail = match exit {
            Ok(()) => "normal".to_string(),
            Err(e) => e.to_string(),
        };
        warn!(session = %id, %detail, "Transport task exited");
        self.disconnected(id, DisconnectReason::TransportExited(detail))
    }

    fn disconnected(&mut self, id: SessionId, reason: DisconnectReason) -> Action {
        info!(session = %id, %reason, "Disconnected");
        self.conn.lost();
        self.handler.handle_disconnected(&reason)
    }

    fn on_command(&mut self, command: Command<H>) -> Action {
        match command {
            Command::Call(request, responder) => {
                self.handler
                    .handle_call(request, responder, &mut self.conn.socket())
            }
            Command::Info(info) => self.handler.handle_info(info, &mut self.conn.socket()),
            Command::Stop(reason) => Action::Stop(reason),
        }
    }
}
