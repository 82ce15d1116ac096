use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    Image,
    Location,
    System,
}

/// The chat channel of a trip (one per trip, created on first lookup)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: i64,
    pub trip_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub last_message_at: Option<NaiveDateTime>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A persisted chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub chat_room_id: i64,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub sender_nickname: Option<String>,
    pub message_type: MessageType,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub read_count: u32,
    #[serde(default)]
    pub deleted: bool,
}

/// Envelope published to the chat broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub chat_room_id: i64,
    pub message_type: MessageType,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub longitude: Option<f64>,
}

impl OutgoingMessage {
    fn plain(chat_room_id: i64, message_type: MessageType, content: String) -> Self {
        Self {
            chat_room_id,
            message_type,
            content,
            image_url: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn text(chat_room_id: i64, content: impl Into<String>) -> Self {
        Self::plain(chat_room_id, MessageType::Text, content.into())
    }

    pub fn image(chat_room_id: i64, caption: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            image_url: Some(image_url.into()),
            ..Self::plain(chat_room_id, MessageType::Image, caption.into())
        }
    }

    pub fn location(chat_room_id: i64, label: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Self::plain(chat_room_id, MessageType::Location, label.into())
        }
    }

    pub fn system(chat_room_id: i64, content: impl Into<String>) -> Self {
        Self::plain(chat_room_id, MessageType::System, content.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub user_name: String,
}
