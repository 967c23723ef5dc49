//! # tether-transport
//!
//! Transport abstraction layer for tether channel clients.
//!
//! This crate provides a unified interface over the connection a channel
//! client runs on:
//!
//! - **WebSocket** - The standard Phoenix socket transport
//! - **Memory** - In-process loopback for tests and embedding
//!
//! ## Transport Abstraction
//!
//! A [`Transport`] starts a session task per connection. The task reports
//! through an [`EventSink`] and drains a [`FrameReceiver`]; the owner keeps
//! the returned [`Session`] and watches its task handle to learn when the
//! transport dies.
//!
//! ```rust,ignore
//! use tether_transport::{event_channel, EventSink, SessionId, Transport, WebSocketTransport};
//!
//! let (tx, mut events) = event_channel();
//! let transport = WebSocketTransport::default();
//! let session = transport.start(&url, EventSink::new(SessionId::generate(), tx))?;
//! while let Some((session_id, event)) = events.recv().await {
//!     // Process event
//! }
//! ```

pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use memory::{MemoryListener, MemoryPeer, MemoryTransport};
pub use traits::{
    event_channel, frame_queue, DisconnectReason, EventReceiver, EventSender, EventSink,
    FrameReceiver, FrameSender, Session, SessionId, Transport, TransportError, TransportEvent,
};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketTransport};
