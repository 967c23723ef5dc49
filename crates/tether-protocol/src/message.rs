//! Message schema for the channel protocol.
//!
//! Every message on the wire carries a topic, an event name, a JSON object
//! payload and an optional reference used to correlate replies.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A per-topic message reference.
pub type Ref = u64;

/// Message payload: a JSON object.
pub type Payload = serde_json::Map<String, Value>;

/// Reserved protocol event names.
pub mod events {
    /// Join a topic.
    pub const JOIN: &str = "phx_join";
    /// Leave a topic.
    pub const LEAVE: &str = "phx_leave";
    /// Server reply correlated to a client message.
    pub const REPLY: &str = "phx_reply";
    /// Channel closed by the server.
    pub const CLOSE: &str = "phx_close";
    /// Channel crashed on the server.
    pub const ERROR: &str = "phx_error";
}

/// The reference always carried by the join message of a topic.
pub const JOIN_REF: Ref = 1;

/// Status value of a successful reply.
pub const STATUS_OK: &str = "ok";

/// A protocol message, inbound or outbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Topic name, e.g. `room:lobby`.
    pub topic: String,
    /// Event name.
    pub event: String,
    /// Event payload.
    #[serde(default, deserialize_with = "nullable_payload")]
    pub payload: Payload,
    /// Correlation reference. Server pushes carry none.
    #[serde(rename = "ref", default, deserialize_with = "lenient_ref")]
    pub reference: Option<Ref>,
}

impl Message {
    /// Create a message.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        event: impl Into<String>,
        payload: Payload,
        reference: Option<Ref>,
    ) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            payload,
            reference,
        }
    }

    /// Create a reply message as a server would send it.
    #[must_use]
    pub fn reply(
        topic: impl Into<String>,
        reference: Ref,
        status: &str,
        response: Payload,
    ) -> Self {
        let mut payload = Payload::new();
        payload.insert("status".into(), Value::String(status.into()));
        payload.insert("response".into(), Value::Object(response));
        Self::new(topic, events::REPLY, payload, Some(reference))
    }

    /// Whether this is a server reply.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.event == events::REPLY
    }

    /// Whether this is the reply to a join.
    #[must_use]
    pub fn is_join_reply(&self) -> bool {
        self.is_reply() && self.reference == Some(JOIN_REF)
    }

    /// Whether the server closed or errored the channel.
    #[must_use]
    pub fn is_channel_closed(&self) -> bool {
        self.event == events::CLOSE || self.event == events::ERROR
    }

    /// The `status` field of a reply payload.
    #[must_use]
    pub fn reply_status(&self) -> Option<&str> {
        self.payload.get("status").and_then(Value::as_str)
    }

    /// Take the `response` field of a reply payload.
    ///
    /// A missing or non-object response yields an empty payload.
    pub fn take_response(&mut self) -> Payload {
        match self.payload.remove("response") {
            Some(Value::Object(map)) => map,
            _ => Payload::new(),
        }
    }
}

fn nullable_payload<'de, D>(deserializer: D) -> Result<Payload, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireRef {
    Number(u64),
    Text(String),
}

// Browser clients send refs as strings and servers echo them back as-is.
fn lenient_ref<'de, D>(deserializer: D) -> Result<Option<Ref>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<WireRef>::deserialize(deserializer)? {
        None => Ok(None),
        Some(WireRef::Number(n)) => Ok(Some(n)),
        Some(WireRef::Text(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid ref: {s}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_reply_detection() {
        let reply = Message::reply("room:1", 1, STATUS_OK, Payload::new());
        assert!(reply.is_reply());
        assert!(reply.is_join_reply());
        assert_eq!(reply.reply_status(), Some("ok"));

        let other = Message::reply("room:1", 2, STATUS_OK, Payload::new());
        assert!(other.is_reply());
        assert!(!other.is_join_reply());
    }

    #[test]
    fn test_channel_closed_detection() {
        let close = Message::new("room:1", events::CLOSE, Payload::new(), None);
        let error = Message::new("room:1", events::ERROR, Payload::new(), None);
        let push = Message::new("room:1", "new_msg", Payload::new(), None);
        assert!(close.is_channel_closed());
        assert!(error.is_channel_closed());
        assert!(!push.is_channel_closed());
    }

    #[test]
    fn test_take_response() {
        let mut response = Payload::new();
        response.insert("user".into(), json!("alice"));
        let mut reply = Message::reply("room:1", 1, "error", response.clone());
        assert_eq!(reply.take_response(), response);

        let mut bare = Message::new("room:1", events::REPLY, Payload::new(), Some(1));
        assert!(bare.take_response().is_empty());
    }

    #[test]
    fn test_lenient_ref_and_payload() {
        let msg: Message = serde_json::from_value(json!({
            "topic": "room:1",
            "event": "phx_reply",
            "payload": null,
            "ref": "7"
        }))
        .unwrap();
        assert_eq!(msg.reference, Some(7));
        assert!(msg.payload.is_empty());

        let push: Message = serde_json::from_value(json!({
            "topic": "room:1",
            "event": "new_msg",
            "payload": {"body": "hi"},
            "ref": null
        }))
        .unwrap();
        assert_eq!(push.reference, None);
        assert_eq!(push.payload["body"], json!("hi"));

        let bad = serde_json::from_value::<Message>(json!({
            "topic": "t", "event": "e", "payload": {}, "ref": "abc"
        }));
        assert!(bad.is_err());
    }
}
