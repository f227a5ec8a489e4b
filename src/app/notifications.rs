use anyhow::Result;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::pagination::offset;
use crate::domain::notification::{Notification, NotificationKind};
use crate::infra::db::Db;
use crate::infra::push::PushChannel;

/// One dispatchable (or retractable) notification. `retract` matches on the
/// same tuple that `dispatch` wrote so inverse actions undo exactly one row.
#[derive(Debug, Clone, Copy)]
pub struct NotificationEvent {
    pub recipient_id: Uuid,
    pub initiator_id: Uuid,
    pub kind: NotificationKind,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
}

impl NotificationEvent {
    pub fn liked_post(recipient_id: Uuid, initiator_id: Uuid, post_id: Uuid) -> Self {
        Self {
            recipient_id,
            initiator_id,
            kind: NotificationKind::LikedPost,
            post_id: Some(post_id),
            comment_id: None,
        }
    }

    pub fn commented_post(
        recipient_id: Uuid,
        initiator_id: Uuid,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Self {
        Self {
            recipient_id,
            initiator_id,
            kind: NotificationKind::CommentedPost,
            post_id: Some(post_id),
            comment_id: Some(comment_id),
        }
    }

    pub fn liked_comment(
        recipient_id: Uuid,
        initiator_id: Uuid,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Self {
        Self {
            recipient_id,
            initiator_id,
            kind: NotificationKind::LikedComment,
            post_id: Some(post_id),
            comment_id: Some(comment_id),
        }
    }

    pub fn followed(recipient_id: Uuid, initiator_id: Uuid) -> Self {
        Self {
            recipient_id,
            initiator_id,
            kind: NotificationKind::Followed,
            post_id: None,
            comment_id: None,
        }
    }
}

#[derive(Clone)]
pub struct NotificationService {
    db: Db,
    push: PushChannel,
}

impl NotificationService {
    pub fn new(db: Db, push: PushChannel) -> Self {
        Self { db, push }
    }

    /// Persist a notification and push it to the recipient. Actions on one's
    /// own content are suppressed entirely.
    pub async fn dispatch(&self, event: NotificationEvent) -> Result<()> {
        if event.recipient_id == event.initiator_id {
            return Ok(());
        }

        let row = sqlx::query(
            "WITH inserted AS ( \
                 INSERT INTO notifications (recipient_id, initiator_id, kind, post_id, comment_id) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id, recipient_id, initiator_id, kind, post_id, comment_id, read_at, created_at \
             ) \
             SELECT i.id, i.recipient_id, i.initiator_id, i.kind, i.post_id, i.comment_id, \
                    i.read_at, i.created_at, u.username, u.first_name, u.last_name \
             FROM inserted i \
             JOIN users u ON u.id = i.initiator_id",
        )
        .bind(event.recipient_id)
        .bind(event.initiator_id)
        .bind(event.kind.as_db())
        .bind(event.post_id)
        .bind(event.comment_id)
        .fetch_one(self.db.pool())
        .await?;

        let notification = map_notification_row(&row)?;
        self.push
            .emit(
                &format!("notification.new.{}", notification.recipient_id),
                notification_payload(&notification)?,
            )
            .await;
        self.emit_unread_count(notification.recipient_id).await?;
        Ok(())
    }

    /// Remove the single notification written for the inverse action, if it
    /// is still present. Unlike after like, unfollow after follow.
    pub async fn retract(&self, event: NotificationEvent) -> Result<()> {
        if event.recipient_id == event.initiator_id {
            return Ok(());
        }

        let result = sqlx::query(
            "DELETE FROM notifications \
             WHERE id IN ( \
                 SELECT id FROM notifications \
                 WHERE recipient_id = $1 AND initiator_id = $2 AND kind = $3 \
                   AND post_id IS NOT DISTINCT FROM $4 \
                   AND comment_id IS NOT DISTINCT FROM $5 \
                 ORDER BY created_at DESC \
                 LIMIT 1 \
             )",
        )
        .bind(event.recipient_id)
        .bind(event.initiator_id)
        .bind(event.kind.as_db())
        .bind(event.post_id)
        .bind(event.comment_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            self.emit_unread_count(event.recipient_id).await?;
        }
        Ok(())
    }

    pub async fn list(
        &self,
        recipient_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Notification>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1")
                .bind(recipient_id)
                .fetch_one(self.db.pool())
                .await?;

        let rows = sqlx::query(
            "SELECT n.id, n.recipient_id, n.initiator_id, n.kind, n.post_id, n.comment_id, \
                    n.read_at, n.created_at, u.username, u.first_name, u.last_name \
             FROM notifications n \
             JOIN users u ON u.id = n.initiator_id \
             WHERE n.recipient_id = $1 \
             ORDER BY n.created_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(recipient_id)
        .bind(limit)
        .bind(offset(page, limit))
        .fetch_all(self.db.pool())
        .await?;

        let notifications = rows
            .iter()
            .map(map_notification_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((notifications, total))
    }

    /// Marks one notification read. Scoped to the recipient so a user cannot
    /// touch another user's rows. Returns false when nothing matched.
    pub async fn mark_read(&self, recipient_id: Uuid, notification_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = now() \
             WHERE id = $1 AND recipient_id = $2 AND read_at IS NULL",
        )
        .bind(notification_id)
        .bind(recipient_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            self.emit_unread_count(recipient_id).await?;
            return Ok(true);
        }

        // Distinguish already-read from nonexistent.
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM notifications WHERE id = $1 AND recipient_id = $2)",
        )
        .bind(notification_id)
        .bind(recipient_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }

    pub async fn mark_all_read(&self, recipient_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = now() \
             WHERE recipient_id = $1 AND read_at IS NULL",
        )
        .bind(recipient_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            self.emit_unread_count(recipient_id).await?;
        }
        Ok(())
    }

    pub async fn unread_count(&self, recipient_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND read_at IS NULL",
        )
        .bind(recipient_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    async fn emit_unread_count(&self, recipient_id: Uuid) -> Result<()> {
        let count = self.unread_count(recipient_id).await?;
        self.push
            .emit(
                &format!("notification.unread.count.{}", recipient_id),
                json!({ "unreadCount": count }),
            )
            .await;
        Ok(())
    }
}

fn map_notification_row(row: &PgRow) -> Result<Notification> {
    let kind: String = row.get("kind");
    let kind = NotificationKind::from_db(&kind)
        .ok_or_else(|| anyhow::anyhow!("unknown notification kind: {kind}"))?;
    let read_at: Option<OffsetDateTime> = row.get("read_at");
    let first_name: String = row.get("first_name");
    let last_name: String = row.get("last_name");

    Ok(Notification {
        id: row.get("id"),
        recipient_id: row.get("recipient_id"),
        initiator_id: row.get("initiator_id"),
        initiator_username: row.get("username"),
        initiator_full_name: crate::domain::user::full_name(&first_name, &last_name),
        kind,
        post_id: row.get("post_id"),
        comment_id: row.get("comment_id"),
        is_read: read_at.is_some(),
        read_at,
        created_at: row.get("created_at"),
    })
}

fn notification_payload(notification: &Notification) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(notification)?)
}
