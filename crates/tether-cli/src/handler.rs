//! The CLI's channel handler.
//!
//! Joins every configured topic on connect, logs whatever arrives and
//! schedules reconnects and rejoins after the configured delay.

use std::collections::BTreeSet;
use std::time::Duration;
use tether_core::{
    Action, ChannelError, ChannelHandler, ClientHandle, Endpoint, HandlerError, Socket,
    Startup, StopReason,
};
use tether_protocol::{Payload, Ref};
use tether_transport::DisconnectReason;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Deferred work delivered back to the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retry {
    /// Open a new connection.
    Reconnect,
    /// Join a topic again after the server closed it.
    Rejoin(String),
}

/// Logs channel traffic for the configured topics.
pub struct TetherHandler {
    handle: ClientHandle<Self>,
    topics: Vec<String>,
    joined: BTreeSet<String>,
    reconnect: bool,
    delay: Duration,
}

impl TetherHandler {
    fn schedule(&self, retry: Retry) {
        let handle = self.handle.clone();
        let delay = self.delay;
        debug!(?retry, ?delay, "Scheduling retry");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The client may have stopped in the meantime.
            let _ = handle.notify(retry);
        });
    }

    fn join(&mut self, topic: &str, socket: &mut Socket<'_>) {
        match socket.join(topic, Payload::new()) {
            Ok(_) => debug!(topic, "Join sent"),
            Err(ChannelError::AlreadyJoined(_)) => debug!(topic, "Join already in flight"),
            Err(e) => warn!(topic, "Join failed: {}", e),
        }
    }
}

fn json(payload: Payload) -> serde_json::Value {
    serde_json::Value::Object(payload)
}

impl ChannelHandler for TetherHandler {
    type Args = Config;
    type Call = ();
    type Reply = ();
    type Info = Retry;

    fn init(config: Config, handle: ClientHandle<Self>) -> Result<Startup<Self>, HandlerError> {
        let endpoint = Endpoint::parse(&config.url)
            .map_err(|e| HandlerError::new(format!("invalid url {}: {}", config.url, e)))?;
        let endpoint = config
            .params
            .iter()
            .fold(endpoint, |ep, (key, value)| ep.with_param(key, value));

        let handler = Self {
            handle,
            delay: config.reconnect_delay(),
            reconnect: config.reconnect.enabled,
            topics: config.topics,
            joined: BTreeSet::new(),
        };
        Ok(Startup::connect(handler, endpoint))
    }

    fn handle_connected(&mut self, socket: &mut Socket<'_>) -> Action {
        info!(session = ?socket.session_id(), "Connected");
        for topic in self.topics.clone() {
            self.join(&topic, socket);
        }
        Action::Continue
    }

    fn handle_disconnected(&mut self, reason: &DisconnectReason) -> Action {
        warn!(%reason, "Disconnected");
        self.joined.clear();

        if !self.reconnect {
            return Action::Stop(StopReason::Shutdown(format!("connection lost: {reason}")));
        }
        self.schedule(Retry::Reconnect);
        Action::Continue
    }

    fn handle_joined(
        &mut self,
        topic: &str,
        response: Payload,
        _socket: &mut Socket<'_>,
    ) -> Action {
        info!(topic, response = %json(response), "Joined");
        self.joined.insert(topic.to_string());
        Action::Continue
    }

    fn handle_join_error(
        &mut self,
        topic: &str,
        response: Payload,
        _socket: &mut Socket<'_>,
    ) -> Action {
        warn!(topic, response = %json(response), "Join rejected");
        Action::Continue
    }

    fn handle_channel_closed(
        &mut self,
        topic: &str,
        payload: Payload,
        _socket: &mut Socket<'_>,
    ) -> Action {
        warn!(topic, payload = %json(payload), "Channel closed");
        if self.joined.remove(topic) {
            self.schedule(Retry::Rejoin(topic.to_string()));
        }
        Action::Continue
    }

    fn handle_message(
        &mut self,
        topic: &str,
        event: &str,
        payload: Payload,
        _socket: &mut Socket<'_>,
    ) -> Action {
        info!(topic, event, payload = %json(payload), "Message");
        Action::Continue
    }

    fn handle_reply(
        &mut self,
        topic: &str,
        reference: Ref,
        payload: Payload,
        _socket: &mut Socket<'_>,
    ) -> Action {
        info!(topic, reference, payload = %json(payload), "Reply");
        Action::Continue
    }

    fn handle_info(&mut self, retry: Retry, socket: &mut Socket<'_>) -> Action {
        match retry {
            Retry::Reconnect => Action::Connect,
            Retry::Rejoin(topic) => {
                if socket.is_connected() {
                    self.join(&topic, socket);
                }
                Action::Continue
            }
        }
    }
}
