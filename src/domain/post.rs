use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub author_full_name: String,
    pub author_avatar_url: Option<String>,
    pub body: String,
    pub media_id: Option<Uuid>,
    pub image_url: Option<String>,
    /// Denormalized caches; the like/comment join tables are authoritative.
    pub likes_count: i64,
    pub comments_count: i64,
    /// Viewer-relative, set per request by the formatter.
    pub is_viewer_liked: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
