//! WebSocket transport implementation.
//!
//! This module provides a WebSocket client transport using tokio-tungstenite.
//! Each session runs in its own task that owns the socket.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tether_protocol::Frame;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{protocol::WebSocketConfig as ProtocolConfig, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::traits::{
    frame_queue, DisconnectReason, EventSink, FrameReceiver, Session, Transport, TransportError,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Interval between websocket pings. `None` disables keepalive.
    pub keepalive: Option<Duration>,
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            keepalive: Some(Duration::from_secs(30)),
            max_message_size: 64 * 1024, // 64 KB
        }
    }
}

/// WebSocket client transport.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    config: WebSocketConfig,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }

    /// Get the transport configuration.
    #[must_use]
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

impl Transport for WebSocketTransport {
    fn start(&self, url: &Url, events: EventSink) -> Result<Session, TransportError> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                url.scheme(),
                url
            )));
        }

        let (outbound, rx) = frame_queue();
        let id = events.session();
        let task = tokio::spawn(run_session(
            url.to_string(),
            self.config.clone(),
            events,
            rx,
        ));

        debug!(session = %id, %url, "WebSocket session started");
        Ok(Session::new(id, outbound, task))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

async fn run_session(
    url: String,
    config: WebSocketConfig,
    events: EventSink,
    outbound: FrameReceiver,
) {
    let mut protocol_config = ProtocolConfig::default();
    protocol_config.max_message_size = Some(config.max_message_size);

    let stream = match connect_async_with_config(url.as_str(), Some(protocol_config), false).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(session = %events.session(), "WebSocket handshake failed: {}", e);
            events.notify_disconnected(DisconnectReason::HandshakeFailed(e.to_string()));
            return;
        }
    };

    info!(session = %events.session(), "WebSocket connected to {}", url);
    if !events.notify_connected() {
        return;
    }

    if let Some(reason) = pump(stream, &config, &events, outbound).await {
        debug!(session = %events.session(), %reason, "WebSocket disconnected");
        events.notify_disconnected(reason);
    }
}

/// Shuttle frames until the connection ends.
///
/// Returns `None` when the owner dropped the session, in which case nobody
/// needs to be told about the disconnect.
async fn pump(
    stream: WsStream,
    config: &WebSocketConfig,
    events: &EventSink,
    mut outbound: FrameReceiver,
) -> Option<DisconnectReason> {
    let (mut sink, mut stream) = stream.split();
    let period = config.keepalive.unwrap_or(Duration::from_secs(3600));
    let mut keepalive = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    debug!(session = %events.session(), "Session dropped, closing socket");
                    let _ = sink.send(Message::Close(None)).await;
                    return None;
                };
                let message = match frame {
                    Frame::Text(text) => Message::Text(text),
                    Frame::Binary(data) => Message::Binary(data.to_vec()),
                };
                if let Err(e) = sink.send(message).await {
                    return Some(DisconnectReason::Error(e.to_string()));
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    events.notify_message(text.into_bytes());
                }
                Some(Ok(Message::Binary(data))) => {
                    events.notify_message(data);
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sink.send(Message::Pong(data)).await {
                        warn!("Failed to send pong: {}", e);
                    }
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.into_owned()))
                        .unwrap_or((None, String::new()));
                    return Some(DisconnectReason::Closed { code, reason });
                }
                Some(Err(e)) => return Some(DisconnectReason::Error(e.to_string())),
                None => {
                    return Some(DisconnectReason::Closed {
                        code: None,
                        reason: "stream ended".into(),
                    })
                }
            },
            _ = keepalive.tick(), if config.keepalive.is_some() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                    return Some(DisconnectReason::Error(e.to_string()));
                }
            }
        }
    }
}
