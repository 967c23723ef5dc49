//! Inbound message classification and dispatch.

use tether_protocol::{Message, Payload, Ref, STATUS_OK};
use tracing::debug;

use crate::handler::{Action, ChannelHandler};
use crate::metrics;
use crate::socket::Socket;

/// What an inbound message means to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The server accepted a join.
    Joined {
        /// Joined topic.
        topic: String,
        /// `response` field of the reply.
        response: Payload,
    },
    /// The server rejected a join.
    JoinError {
        /// Topic the join was for.
        topic: String,
        /// `response` field of the reply.
        response: Payload,
    },
    /// A reply to a non-join message.
    Reply {
        /// Topic of the original message.
        topic: String,
        /// Ref of the original message.
        reference: Ref,
        /// Untouched reply payload.
        payload: Payload,
    },
    /// The channel was closed or crashed on the server.
    ChannelClosed {
        /// Closed topic.
        topic: String,
        /// Close payload.
        payload: Payload,
    },
    /// Any other server push.
    Message {
        /// Topic.
        topic: String,
        /// Event name.
        event: String,
        /// Event payload.
        payload: Payload,
    },
}

/// Classify a decoded message.
///
/// Join replies win over other replies, replies win over channel closes, and
/// everything else is a plain message. A reply without a ref cannot be
/// correlated and is treated as a plain message.
#[must_use]
pub fn classify(mut message: Message) -> Inbound {
    if message.is_join_reply() {
        let ok = message.reply_status() == Some(STATUS_OK);
        let response = message.take_response();
        return if ok {
            Inbound::Joined {
                topic: message.topic,
                response,
            }
        } else {
            Inbound::JoinError {
                topic: message.topic,
                response,
            }
        };
    }

    if message.is_reply() {
        if let Some(reference) = message.reference {
            return Inbound::Reply {
                topic: message.topic,
                reference,
                payload: message.payload,
            };
        }
    }

    if message.is_channel_closed() {
        return Inbound::ChannelClosed {
            topic: message.topic,
            payload: message.payload,
        };
    }

    Inbound::Message {
        topic: message.topic,
        event: message.event,
        payload: message.payload,
    }
}

/// Hand a classified message to the matching callback.
///
/// Rejected joins and closed channels lose their ref state first, so the
/// topic can be joined again.
pub(crate) fn dispatch<H: ChannelHandler>(
    handler: &mut H,
    inbound: Inbound,
    socket: &mut Socket<'_>,
) -> Action {
    match inbound {
        Inbound::Joined { topic, response } => {
            debug!(topic = %topic, "Joined");
            metrics::record_join("ok");
            handler.handle_joined(&topic, response, socket)
        }
        Inbound::JoinError { topic, response } => {
            debug!(topic = %topic, "Join rejected");
            metrics::record_join("error");
            socket.forget(&topic);
            handler.handle_join_error(&topic, response, socket)
        }
        Inbound::Reply {
            topic,
            reference,
            payload,
        } => handler.handle_reply(&topic, reference, payload, socket),
        Inbound::ChannelClosed { topic, payload } => {
            debug!(topic = %topic, "Channel closed");
            socket.forget(&topic);
            handler.handle_channel_closed(&topic, payload, socket)
        }
        Inbound::Message {
            topic,
            event,
            payload,
        } => handler.handle_message(&topic, &event, payload, socket),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_protocol::events;

    fn payload(value: serde_json::Value) -> Payload {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    #[test]
    fn test_classify_join_ok() {
        let reply = Message::reply("room:1", 1, "ok", payload(json!({"user": 7})));
        assert_eq!(
            classify(reply),
            Inbound::Joined {
                topic: "room:1".into(),
                response: payload(json!({"user": 7})),
            }
        );
    }

    #[test]
    fn test_classify_join_error_any_status() {
        for status in ["error", "unauthorized", ""] {
            let reply = Message::reply("room:1", 1, status, payload(json!({"reason": "no"})));
            assert_eq!(
                classify(reply),
                Inbound::JoinError {
                    topic: "room:1".into(),
                    response: payload(json!({"reason": "no"})),
                }
            );
        }

        let no_status = Message::new("room:1", events::REPLY, Payload::new(), Some(1));
        assert!(matches!(classify(no_status), Inbound::JoinError { .. }));
    }

    #[test]
    fn test_classify_reply_keeps_payload() {
        let body = payload(json!({"status": "error", "response": {"x": 1}}));
        let reply = Message::new("room:1", events::REPLY, body.clone(), Some(2));
        assert_eq!(
            classify(reply),
            Inbound::Reply {
                topic: "room:1".into(),
                reference: 2,
                payload: body,
            }
        );
    }

    #[test]
    fn test_classify_reply_without_ref() {
        let reply = Message::new("room:1", events::REPLY, Payload::new(), None);
        assert!(matches!(classify(reply), Inbound::Message { .. }));
    }

    #[test]
    fn test_classify_channel_closed() {
        for event in [events::CLOSE, events::ERROR] {
            let msg = Message::new("room:1", event, payload(json!({"any": true})), Some(1));
            assert_eq!(
                classify(msg),
                Inbound::ChannelClosed {
                    topic: "room:1".into(),
                    payload: payload(json!({"any": true})),
                }
            );
        }
    }

    #[test]
    fn test_classify_push() {
        let msg = Message::new("room:1", "new_msg", payload(json!({"body": "hi"})), None);
        assert_eq!(
            classify(msg),
            Inbound::Message {
                topic: "room:1".into(),
                event: "new_msg".into(),
                payload: payload(json!({"body": "hi"})),
            }
        );
    }
}
