//! # tether-core
//!
//! Client-side state machine for Phoenix-style channels.
//!
//! This crate provides the pieces between an application and a transport:
//!
//! - **RefAllocator** - Per-topic message refs, ref 1 reserved for the join
//! - **Socket** - The send path (`join`, `push`, `leave`) handed to callbacks
//! - **Dispatch** - Classifies inbound messages into handler callbacks
//! - **Client** - The task owning the connection lifecycle
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ events  ┌─────────────┐ classify ┌────────────────┐
//! │  Transport  │────────▶│   Client    │─────────▶│ ChannelHandler │
//! └─────────────┘         └─────────────┘          └────────────────┘
//!        ▲                       │                        │
//!        │ frames                ▼                        │ Action
//!        └─────────────────  Socket  ◀────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use tether_core::{
//!     Action, ChannelHandler, ClientHandle, Endpoint, HandlerError, Socket, Startup,
//! };
//! use tether_protocol::Payload;
//!
//! struct Lobby;
//!
//! impl ChannelHandler for Lobby {
//!     type Args = ();
//!     type Call = ();
//!     type Reply = ();
//!     type Info = ();
//!
//!     fn init(_: (), _: ClientHandle<Self>) -> Result<Startup<Self>, HandlerError> {
//!         let endpoint = Endpoint::parse("ws://localhost:4000/socket/websocket")
//!             .map_err(|e| HandlerError::new(e.to_string()))?;
//!         Ok(Startup::connect(Lobby, endpoint))
//!     }
//!
//!     fn handle_connected(&mut self, socket: &mut Socket<'_>) -> Action {
//!         let _ = socket.join("room:lobby", Payload::new());
//!         Action::Continue
//!     }
//! }
//! ```

pub mod client;
mod connection;
pub mod dispatch;
pub mod handler;
pub mod metrics;
pub mod refs;
pub mod socket;

pub use client::{Client, ClientError, ClientHandle, ClientOptions};
pub use dispatch::{classify, Inbound};
pub use handler::{Action, ChannelHandler, Endpoint, HandlerError, Responder, Startup, StopReason};
pub use refs::RefAllocator;
pub use socket::{ChannelError, Socket};
