use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lightweight user shape embedded in conversations and messages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

/// A two-party conversation. The row stores both participants in canonical
/// order; `participant` (the other user relative to the viewer) and
/// `unread_messages_count` are filled in by the viewer formatter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    #[serde(skip)]
    pub first: Participant,
    #[serde(skip)]
    pub second: Participant,
    pub participant: Option<Participant>,
    pub unread_messages_count: i64,
    pub last_message: Option<Message>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub body: Option<String>,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub seen_at: Option<OffsetDateTime>,
    pub reactions: Vec<MessageReaction>,
    /// Set per request by the formatter: `is_me_sender` relative to the
    /// viewer, `recipient` = the participant the message was sent to.
    pub is_me_sender: bool,
    pub recipient: Option<Participant>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReaction {
    pub user_id: Uuid,
    pub emoji: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
