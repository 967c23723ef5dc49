//! # tether-protocol
//!
//! Wire protocol definitions for Phoenix-style channels.
//!
//! This crate defines the message schema exchanged between a channel client
//! and server, the reserved control events, and pluggable serializers.
//!
//! ## Reserved Events
//!
//! - `phx_join` / `phx_leave` - Topic membership
//! - `phx_reply` - Reply correlated to a client message by `ref`
//! - `phx_close` / `phx_error` - Channel closed or crashed on the server
//!
//! ## Example
//!
//! ```rust
//! use tether_protocol::{events, JsonSerializer, Message, Payload, Serializer};
//!
//! let join = Message::new("room:lobby", events::JOIN, Payload::new(), Some(1));
//!
//! let frame = JsonSerializer.encode(&join).unwrap();
//! let decoded = JsonSerializer.decode(frame.as_bytes()).unwrap();
//! assert_eq!(decoded, join);
//! ```

pub mod codec;
pub mod message;
pub mod version;

pub use codec::{Frame, JsonSerializer, MsgPackSerializer, ProtocolError, Serializer};
pub use message::{events, Message, Payload, Ref, JOIN_REF, STATUS_OK};
pub use version::{Version, PROTOCOL_VERSION, VERSION_PARAM};
