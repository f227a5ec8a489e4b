use anyhow::Result;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::pagination::offset;
use crate::domain::conversation::{Conversation, Message, MessageReaction, Participant};
use crate::domain::user::full_name;
use crate::infra::db::Db;
use crate::infra::push::PushChannel;

pub enum OpenResult {
    Opened(Conversation),
    UserNotFound,
}

pub enum SendMessageResult {
    Sent {
        message: Message,
        participants: (Participant, Participant),
    },
    ConversationNotFound,
    Forbidden,
    MediaNotOwned,
}

pub enum ListMessagesResult {
    Listed {
        messages: Vec<Message>,
        participants: (Participant, Participant),
        total: i64,
    },
    ConversationNotFound,
    Forbidden,
}

pub enum SeenResult {
    Marked,
    ConversationNotFound,
    Forbidden,
}

pub enum ReactionResult {
    Applied,
    Removed,
    MessageNotFound,
    Forbidden,
}

#[derive(Clone)]
pub struct ConversationService {
    db: Db,
    push: PushChannel,
}

impl ConversationService {
    pub fn new(db: Db, push: PushChannel) -> Self {
        Self { db, push }
    }

    /// Get-or-create the conversation between two users. Participants are
    /// stored in canonical uuid order so each pair maps to one row.
    pub async fn open(&self, user_id: Uuid, other_id: Uuid) -> Result<OpenResult> {
        let other_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(other_id)
        .fetch_one(self.db.pool())
        .await?;
        if !other_exists {
            return Ok(OpenResult::UserNotFound);
        }

        let (first, second) = canonical_pair(user_id, other_id);
        let conversation_id: Uuid = sqlx::query_scalar(
            "INSERT INTO conversations (first_user_id, second_user_id) VALUES ($1, $2) \
             ON CONFLICT (first_user_id, second_user_id) \
             DO UPDATE SET updated_at = conversations.updated_at \
             RETURNING id",
        )
        .bind(first)
        .bind(second)
        .fetch_one(self.db.pool())
        .await?;

        let conversation = self
            .load(conversation_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("conversation vanished after upsert"))?;
        Ok(OpenResult::Opened(conversation))
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Conversation>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conversations \
             WHERE first_user_id = $1 OR second_user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        let query = format!(
            "{} WHERE c.first_user_id = $1 OR c.second_user_id = $1 \
             ORDER BY c.updated_at DESC LIMIT $2 OFFSET $3",
            conversation_query()
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset(page, limit))
            .fetch_all(self.db.pool())
            .await?;

        Ok((rows.iter().map(map_conversation_row).collect(), total))
    }

    pub async fn send_message(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        body: Option<String>,
        media_id: Option<Uuid>,
    ) -> Result<SendMessageResult> {
        let participants = match self.membership(conversation_id, user_id).await? {
            Membership::Member { first, second } => (first, second),
            Membership::NotFound => return Ok(SendMessageResult::ConversationNotFound),
            Membership::NotMember => return Ok(SendMessageResult::Forbidden),
        };

        if let Some(media_id) = media_id {
            let owned: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM media \
                 WHERE id = $1 AND owner_id = $2 AND deleted_at IS NULL)",
            )
            .bind(media_id)
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
            if !owned {
                return Ok(SendMessageResult::MediaNotOwned);
            }
        }

        let row = sqlx::query(
            "WITH inserted AS ( \
                 INSERT INTO messages (conversation_id, sender_id, body, media_id) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, conversation_id, sender_id, body, media_id, seen_at, created_at \
             ) \
             SELECT i.id, i.conversation_id, i.sender_id, i.body, i.seen_at, i.created_at, \
                    m.url AS image_url \
             FROM inserted i \
             LEFT JOIN media m ON m.id = i.media_id",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(body)
        .bind(media_id)
        .fetch_one(self.db.pool())
        .await?;
        let message = map_message_row(&row);

        sqlx::query(
            "UPDATE conversations SET last_message_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(conversation_id)
        .bind(message.id)
        .execute(self.db.pool())
        .await?;

        self.push
            .emit(
                &format!("message.new.{}", conversation_id),
                serde_json::to_value(&message)?,
            )
            .await;
        Ok(SendMessageResult::Sent {
            message,
            participants,
        })
    }

    pub async fn list_messages(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<ListMessagesResult> {
        let participants = match self.membership(conversation_id, user_id).await? {
            Membership::Member { first, second } => (first, second),
            Membership::NotFound => return Ok(ListMessagesResult::ConversationNotFound),
            Membership::NotMember => return Ok(ListMessagesResult::Forbidden),
        };

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE conversation_id = $1 AND deleted_at IS NULL",
        )
        .bind(conversation_id)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(
            "SELECT msg.id, msg.conversation_id, msg.sender_id, msg.body, msg.seen_at, \
                    msg.created_at, m.url AS image_url \
             FROM messages msg \
             LEFT JOIN media m ON m.id = msg.media_id \
             WHERE msg.conversation_id = $1 AND msg.deleted_at IS NULL \
             ORDER BY msg.created_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(conversation_id)
        .bind(limit)
        .bind(offset(page, limit))
        .fetch_all(self.db.pool())
        .await?;

        let mut messages: Vec<Message> = rows.iter().map(map_message_row).collect();
        self.attach_reactions(&mut messages).await?;
        Ok(ListMessagesResult::Listed {
            messages,
            participants,
            total,
        })
    }

    /// Marks every message from the other participant as seen. One event per
    /// call, even when nothing changed.
    pub async fn mark_seen(&self, user_id: Uuid, conversation_id: Uuid) -> Result<SeenResult> {
        match self.membership(conversation_id, user_id).await? {
            Membership::Member { .. } => {}
            Membership::NotFound => return Ok(SeenResult::ConversationNotFound),
            Membership::NotMember => return Ok(SeenResult::Forbidden),
        }

        sqlx::query(
            "UPDATE messages SET seen_at = now() \
             WHERE conversation_id = $1 AND sender_id <> $2 \
               AND seen_at IS NULL AND deleted_at IS NULL",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        self.push
            .emit(
                &format!("message.seen.{}", conversation_id),
                json!({ "conversationId": conversation_id, "seenBy": user_id }),
            )
            .await;
        Ok(SeenResult::Marked)
    }

    /// Upserts the user's reaction on a message. One reaction per user per
    /// message; re-reacting swaps the emoji.
    pub async fn react(
        &self,
        user_id: Uuid,
        message_id: Uuid,
        emoji: &str,
    ) -> Result<ReactionResult> {
        let Some(conversation_id) = self.message_conversation(message_id).await? else {
            return Ok(ReactionResult::MessageNotFound);
        };
        match self.membership(conversation_id, user_id).await? {
            Membership::Member { .. } => {}
            _ => return Ok(ReactionResult::Forbidden),
        }

        sqlx::query(
            "INSERT INTO message_reactions (message_id, user_id, emoji) VALUES ($1, $2, $3) \
             ON CONFLICT (message_id, user_id) DO UPDATE SET emoji = EXCLUDED.emoji",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .execute(self.db.pool())
        .await?;

        self.push
            .emit(
                &format!("message.react.{}", conversation_id),
                json!({ "messageId": message_id, "userId": user_id, "emoji": emoji }),
            )
            .await;
        Ok(ReactionResult::Applied)
    }

    pub async fn unreact(&self, user_id: Uuid, message_id: Uuid) -> Result<ReactionResult> {
        let Some(conversation_id) = self.message_conversation(message_id).await? else {
            return Ok(ReactionResult::MessageNotFound);
        };
        match self.membership(conversation_id, user_id).await? {
            Membership::Member { .. } => {}
            _ => return Ok(ReactionResult::Forbidden),
        }

        sqlx::query("DELETE FROM message_reactions WHERE message_id = $1 AND user_id = $2")
            .bind(message_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        self.push
            .emit(
                &format!("message.react.{}", conversation_id),
                json!({ "messageId": message_id, "userId": user_id, "emoji": null }),
            )
            .await;
        Ok(ReactionResult::Removed)
    }

    async fn load(&self, conversation_id: Uuid) -> Result<Option<Conversation>> {
        let query = format!("{} WHERE c.id = $1", conversation_query());
        let row = sqlx::query(&query)
            .bind(conversation_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.as_ref().map(map_conversation_row))
    }

    /// Resolves the conversation's participant pair and the caller's place in
    /// it. Members get the full pair back so message responses can carry the
    /// recipient without a second lookup.
    async fn membership(&self, conversation_id: Uuid, user_id: Uuid) -> Result<Membership> {
        let row = sqlx::query(
            "SELECT f.id AS first_id, f.username AS first_username, \
                    f.first_name AS first_first_name, f.last_name AS first_last_name, \
                    fa.url AS first_avatar_url, \
                    s.id AS second_id, s.username AS second_username, \
                    s.first_name AS second_first_name, s.last_name AS second_last_name, \
                    sa.url AS second_avatar_url \
             FROM conversations c \
             JOIN users f ON f.id = c.first_user_id \
             JOIN users s ON s.id = c.second_user_id \
             LEFT JOIN media fa ON fa.id = f.avatar_media_id \
             LEFT JOIN media sa ON sa.id = s.avatar_media_id \
             WHERE c.id = $1",
        )
        .bind(conversation_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(Membership::NotFound);
        };
        let (first, second) = map_participant_pair(&row);
        if user_id == first.id || user_id == second.id {
            Ok(Membership::Member { first, second })
        } else {
            Ok(Membership::NotMember)
        }
    }

    async fn message_conversation(&self, message_id: Uuid) -> Result<Option<Uuid>> {
        let conversation_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT conversation_id FROM messages WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(message_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(conversation_id)
    }

    async fn attach_reactions(&self, messages: &mut [Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = messages.iter().map(|message| message.id).collect();

        let rows = sqlx::query(
            "SELECT message_id, user_id, emoji, created_at \
             FROM message_reactions \
             WHERE message_id = ANY($1) \
             ORDER BY created_at",
        )
        .bind(&ids)
        .fetch_all(self.db.pool())
        .await?;

        for row in rows {
            let message_id: Uuid = row.get("message_id");
            let reaction = MessageReaction {
                user_id: row.get("user_id"),
                emoji: row.get("emoji"),
                created_at: row.get("created_at"),
            };
            if let Some(message) = messages.iter_mut().find(|message| message.id == message_id) {
                message.reactions.push(reaction);
            }
        }
        Ok(())
    }
}

enum Membership {
    Member {
        first: Participant,
        second: Participant,
    },
    NotMember,
    NotFound,
}

fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn conversation_query() -> &'static str {
    "SELECT c.id, c.created_at, c.updated_at, \
            f.id AS first_id, f.username AS first_username, \
            f.first_name AS first_first_name, f.last_name AS first_last_name, \
            fa.url AS first_avatar_url, \
            s.id AS second_id, s.username AS second_username, \
            s.first_name AS second_first_name, s.last_name AS second_last_name, \
            sa.url AS second_avatar_url, \
            lm.id AS message_id, lm.sender_id AS message_sender_id, \
            lm.body AS message_body, lm.seen_at AS message_seen_at, \
            lm.created_at AS message_created_at, lmm.url AS message_image_url \
     FROM conversations c \
     JOIN users f ON f.id = c.first_user_id \
     JOIN users s ON s.id = c.second_user_id \
     LEFT JOIN media fa ON fa.id = f.avatar_media_id \
     LEFT JOIN media sa ON sa.id = s.avatar_media_id \
     LEFT JOIN messages lm ON lm.id = c.last_message_id AND lm.deleted_at IS NULL \
     LEFT JOIN media lmm ON lmm.id = lm.media_id"
}

fn map_participant_pair(row: &PgRow) -> (Participant, Participant) {
    let first_first_name: String = row.get("first_first_name");
    let first_last_name: String = row.get("first_last_name");
    let second_first_name: String = row.get("second_first_name");
    let second_last_name: String = row.get("second_last_name");

    (
        Participant {
            id: row.get("first_id"),
            username: row.get("first_username"),
            full_name: full_name(&first_first_name, &first_last_name),
            avatar_url: row.get("first_avatar_url"),
        },
        Participant {
            id: row.get("second_id"),
            username: row.get("second_username"),
            full_name: full_name(&second_first_name, &second_last_name),
            avatar_url: row.get("second_avatar_url"),
        },
    )
}

fn map_conversation_row(row: &PgRow) -> Conversation {
    let conversation_id: Uuid = row.get("id");
    let (first, second) = map_participant_pair(row);

    let last_message_id: Option<Uuid> = row.get("message_id");
    let last_message = last_message_id.map(|id| Message {
        id,
        conversation_id,
        sender_id: row.get("message_sender_id"),
        body: row.get("message_body"),
        image_url: row.get("message_image_url"),
        seen_at: row.get("message_seen_at"),
        reactions: vec![],
        is_me_sender: false,
        recipient: None,
        created_at: row.get("message_created_at"),
    });

    Conversation {
        id: conversation_id,
        first,
        second,
        participant: None,
        unread_messages_count: 0,
        last_message,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn map_message_row(row: &PgRow) -> Message {
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        body: row.get("body"),
        image_url: row.get("image_url"),
        seen_at: row.get("seen_at"),
        reactions: vec![],
        is_me_sender: false,
        recipient: None,
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_orders_by_uuid() {
        let a = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let b = Uuid::parse_str("00000000-0000-0000-0000-000000000002").unwrap();
        assert_eq!(canonical_pair(a, b), (a, b));
        assert_eq!(canonical_pair(b, a), (a, b));
    }
}
