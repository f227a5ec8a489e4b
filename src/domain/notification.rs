use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LikedPost,
    CommentedPost,
    LikedComment,
    Followed,
}

impl NotificationKind {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "liked_post" => Some(Self::LikedPost),
            "commented_post" => Some(Self::CommentedPost),
            "liked_comment" => Some(Self::LikedComment),
            "followed" => Some(Self::Followed),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::LikedPost => "liked_post",
            Self::CommentedPost => "commented_post",
            Self::LikedComment => "liked_comment",
            Self::Followed => "followed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub initiator_id: Uuid,
    pub initiator_username: String,
    pub initiator_full_name: String,
    pub kind: NotificationKind,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
    /// Derived from `read_at`, set on load.
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
