//! Typed server-generated events and their wire names.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::CoordinatorError;

/// How a message line should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Chat,
    Private,
    Notification,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagePayload {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl MessagePayload {
    pub fn chat(sender: &str, text: &str) -> Self {
        Self {
            kind: MessageKind::Chat,
            sender: Some(sender.to_string()),
            text: text.to_string(),
            sent_at: Utc::now(),
        }
    }

    pub fn private(sender: &str, text: &str) -> Self {
        Self {
            kind: MessageKind::Private,
            sender: Some(sender.to_string()),
            text: text.to_string(),
            sent_at: Utc::now(),
        }
    }

    pub fn notification(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Notification,
            sender: None,
            text: text.into(),
            sent_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReceivedPayload {
    pub sender: String,
    pub filename: String,
    pub filesize: u64,
    pub filepath: String,
    pub file_url: String,
    /// By-extension hint for inline previews; advisory only, never
    /// security-relevant.
    pub is_image: bool,
}

/// A server-generated event, delivered to one or many sessions.
#[derive(Debug, Clone)]
pub enum Event {
    Message(MessagePayload),
    RoomInfo { room: String, members: Vec<String> },
    UsersList(Vec<String>),
    /// Every room with its members, directory-ordered (lobby first).
    RoomsList(Vec<(String, Vec<String>)>),
    FileReceived(FileReceivedPayload),
    CallIncoming { caller: String },
    CallStarted { partner: String },
    CallEnded { message: String },
    Error { code: &'static str, message: String },
}

impl Event {
    pub fn error(err: &CoordinatorError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }

    /// Dispatch name used as `t` on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message(_) => "MESSAGE",
            Self::RoomInfo { .. } => "ROOM_INFO",
            Self::UsersList(_) => "USERS_LIST",
            Self::RoomsList(_) => "ROOMS_LIST",
            Self::FileReceived(_) => "FILE_RECEIVED",
            Self::CallIncoming { .. } => "CALL_INCOMING",
            Self::CallStarted { .. } => "CALL_STARTED",
            Self::CallEnded { .. } => "CALL_ENDED",
            Self::Error { .. } => "ERROR",
        }
    }

    /// Serialized payload for the `d` field.
    pub fn data(&self) -> Value {
        match self {
            Self::Message(payload) => serde_json::to_value(payload).unwrap_or_default(),
            Self::RoomInfo { room, members } => {
                serde_json::json!({ "room": room, "members": members })
            }
            Self::UsersList(users) => serde_json::json!({ "users": users }),
            Self::RoomsList(rooms) => {
                // serde_json's preserve_order keeps the directory order
                // (lobby first) when this map reaches the client.
                let mut map = serde_json::Map::new();
                for (name, members) in rooms {
                    map.insert(
                        name.clone(),
                        serde_json::to_value(members).unwrap_or_default(),
                    );
                }
                Value::Object(map)
            }
            Self::FileReceived(payload) => serde_json::to_value(payload).unwrap_or_default(),
            Self::CallIncoming { caller } => serde_json::json!({ "caller": caller }),
            Self::CallStarted { partner } => serde_json::json!({ "partner": partner }),
            Self::CallEnded { message } => serde_json::json!({ "message": message }),
            Self::Error { code, message } => {
                serde_json::json!({ "code": code, "message": message })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooms_list_preserves_directory_order() {
        let event = Event::RoomsList(vec![
            ("lobby".to_string(), vec![]),
            ("zebra".to_string(), vec!["alice".to_string()]),
            ("apple".to_string(), vec!["bob".to_string()]),
        ]);
        let data = event.data();
        let keys: Vec<&String> = data.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["lobby", "zebra", "apple"]);
    }

    #[test]
    fn notification_has_no_sender() {
        let event = Event::Message(MessagePayload::notification("alice joined"));
        let data = event.data();
        assert_eq!(data["type"], "notification");
        assert!(data.get("sender").is_none());
    }

    #[test]
    fn error_event_carries_code() {
        let event = Event::error(&CoordinatorError::UserNotFound("ghost".to_string()));
        assert_eq!(event.name(), "ERROR");
        assert_eq!(event.data()["code"], "USER_NOT_FOUND");
    }
}
