//! Serializers for channel messages.
//!
//! A [`Serializer`] turns a [`Message`] into a transport [`Frame`] and back.
//! Two are provided: JSON text frames (the format browser clients speak) and
//! MessagePack binary frames.

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

use crate::message::Message;

/// Maximum frame size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// An encoded frame, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Bytes),
}

impl Frame {
    /// Get the frame contents as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(data) => data,
        }
    }

    /// Get the frame size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Check if the frame is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encodes and decodes channel messages.
pub trait Serializer: Send + Sync + fmt::Debug {
    /// Serializer name, for logging.
    fn name(&self) -> &'static str;

    /// Encode a message into a frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be encoded or is too large.
    fn encode(&self, message: &Message) -> Result<Frame, ProtocolError>;

    /// Decode a message from raw frame bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is too large or not a valid message.
    fn decode(&self, data: &[u8]) -> Result<Message, ProtocolError>;
}

fn check_size(len: usize) -> Result<(), ProtocolError> {
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    Ok(())
}

/// JSON object serializer: `{"topic", "event", "payload", "ref"}` in text frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, message: &Message) -> Result<Frame, ProtocolError> {
        let text = serde_json::to_string(message)?;
        check_size(text.len())?;
        Ok(Frame::Text(text))
    }

    fn decode(&self, data: &[u8]) -> Result<Message, ProtocolError> {
        check_size(data.len())?;
        Ok(serde_json::from_slice(data)?)
    }
}

/// MessagePack serializer with named fields, in binary frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackSerializer;

impl Serializer for MsgPackSerializer {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode(&self, message: &Message) -> Result<Frame, ProtocolError> {
        let data = rmp_serde::to_vec_named(message)?;
        check_size(data.len())?;
        Ok(Frame::Binary(Bytes::from(data)))
    }

    fn decode(&self, data: &[u8]) -> Result<Message, ProtocolError> {
        check_size(data.len())?;
        Ok(rmp_serde::from_slice(data)?)
    }
}
