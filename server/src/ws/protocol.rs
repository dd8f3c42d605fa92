//! JSON event framing for the messenger socket.
//!
//! Every frame is `{"event": "<name>", "data": {...}}` with camelCase fields.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::db::models::{PrivateMessage, UserId};
use crate::ws::ConnectionSender;

pub const EVENT_PRIVATE_MESSAGE: &str = "private:message";
pub const EVENT_MESSAGE_READ: &str = "private:message:read";

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "private:message", rename_all = "camelCase")]
    SendMessage { receiver_id: UserId, content: String },

    #[serde(rename = "private:message:read", rename_all = "camelCase")]
    MarkRead { sender_id: UserId },

    #[serde(rename = "private:typing", rename_all = "camelCase")]
    Typing { receiver_id: UserId },
}

/// Events the server pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// New message, to the receiver's connections.
    #[serde(rename = "private:message")]
    Message(PrivateMessage),

    /// Delivery acknowledgment, to the sending connection only.
    #[serde(rename = "private:message:sent")]
    MessageSent(PrivateMessage),

    /// Read receipt, to the original sender's connections.
    #[serde(rename = "private:message:read", rename_all = "camelCase")]
    MessageRead { reader_id: UserId },

    #[serde(rename = "private:typing", rename_all = "camelCase")]
    Typing { user_id: UserId },

    #[serde(rename = "user:status", rename_all = "camelCase")]
    UserStatus { user_id: UserId, is_online: bool },

    #[serde(rename = "error")]
    Error {
        code: u16,
        message: String,
        event: Option<String>,
    },
}

impl ServerEvent {
    /// Encode as a text frame. Serialization of these types cannot fail in
    /// practice; if it does the frame is dropped and logged.
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode server event");
                None
            }
        }
    }
}

/// Why an inbound frame could not be turned into a [`ClientEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError(pub String);

/// Decode an inbound text or binary frame.
pub fn decode(data: &[u8]) -> Result<ClientEvent, DecodeError> {
    serde_json::from_slice(data).map_err(|e| DecodeError(e.to_string()))
}

/// Push one event to a single connection. A closed connection is skipped.
pub fn send_event(tx: &ConnectionSender, event: &ServerEvent) -> bool {
    match event.to_message() {
        Some(msg) => tx.send(msg).is_ok(),
        None => false,
    }
}

/// Send an `error` event to a single connection.
pub fn send_error(tx: &ConnectionSender, code: u16, message: &str, event: Option<&str>) {
    send_event(
        tx,
        &ServerEvent::Error {
            code,
            message: message.to_string(),
            event: event.map(str::to_string),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_send_message() {
        let frame = json!({
            "event": "private:message",
            "data": { "receiverId": 2, "content": "hi" }
        });
        let event = decode(frame.to_string().as_bytes()).unwrap();
        assert_eq!(
            event,
            ClientEvent::SendMessage {
                receiver_id: 2,
                content: "hi".to_string()
            }
        );
    }

    #[test]
    fn test_decode_read_and_typing() {
        let read = json!({ "event": "private:message:read", "data": { "senderId": 5 } });
        assert_eq!(
            decode(read.to_string().as_bytes()).unwrap(),
            ClientEvent::MarkRead { sender_id: 5 }
        );

        let typing = json!({ "event": "private:typing", "data": { "receiverId": 9 } });
        assert_eq!(
            decode(typing.to_string().as_bytes()).unwrap(),
            ClientEvent::Typing { receiver_id: 9 }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_and_malformed() {
        let unknown = json!({ "event": "private:call", "data": { "receiverId": 2 } });
        assert!(decode(unknown.to_string().as_bytes()).is_err());

        let missing_field = json!({ "event": "private:message", "data": { "receiverId": 2 } });
        assert!(decode(missing_field.to_string().as_bytes()).is_err());

        let wrong_type = json!({ "event": "private:typing", "data": { "receiverId": "two" } });
        assert!(decode(wrong_type.to_string().as_bytes()).is_err());

        assert!(decode(b"not json").is_err());
    }

    #[test]
    fn test_server_event_wire_shape() {
        let status = serde_json::to_value(ServerEvent::UserStatus {
            user_id: 3,
            is_online: true,
        })
        .unwrap();
        assert_eq!(
            status,
            json!({ "event": "user:status", "data": { "userId": 3, "isOnline": true } })
        );

        let read = serde_json::to_value(ServerEvent::MessageRead { reader_id: 4 }).unwrap();
        assert_eq!(
            read,
            json!({ "event": "private:message:read", "data": { "readerId": 4 } })
        );
    }

    #[test]
    fn test_message_event_carries_camel_case_message() {
        let now = chrono::Utc::now();
        let event = ServerEvent::MessageSent(PrivateMessage {
            id: 1,
            sender_id: 1,
            receiver_id: 2,
            content: "hi".to_string(),
            is_read: false,
            created_at: now,
            updated_at: now,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "private:message:sent");
        assert_eq!(value["data"]["senderId"], 1);
        assert_eq!(value["data"]["receiverId"], 2);
        assert_eq!(value["data"]["isRead"], false);
        assert!(value["data"]["createdAt"].is_string());
    }

    #[test]
    fn test_send_event_to_closed_connection() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        assert!(!send_event(&tx, &ServerEvent::Typing { user_id: 1 }));
    }
}
