use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::app::counts::CountMaintainer;
use crate::app::notifications::{NotificationEvent, NotificationService};
use crate::app::pagination::offset;
use crate::app::users::map_profile_row;
use crate::domain::engagement::Comment;
use crate::domain::user::{full_name, Profile};
use crate::infra::db::Db;
use crate::infra::push::PushChannel;

pub const MAX_COMMENT_LEN: usize = 2000;

/// Outcome of a like. `Applied` carries the optimistic counter value
/// returned to the client while the recount converges in the background.
pub enum LikeResult {
    Applied(i64),
    Duplicate,
    TargetNotFound,
}

pub enum UnlikeResult {
    Applied(i64),
    Missing,
    TargetNotFound,
}

pub enum CommentCreateResult {
    Created(Comment),
    PostNotFound,
}

pub enum CommentDeleteResult {
    Deleted,
    NotFound,
    Forbidden,
}

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
    counts: CountMaintainer,
    notifications: NotificationService,
}

impl EngagementService {
    pub fn new(db: Db, push: PushChannel) -> Self {
        Self {
            counts: CountMaintainer::new(db.clone()),
            notifications: NotificationService::new(db.clone(), push),
            db,
        }
    }

    pub async fn like_post(&self, user_id: Uuid, post_id: Uuid) -> Result<LikeResult> {
        let Some(row) = sqlx::query(
            "SELECT author_id, likes_count FROM posts WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?
        else {
            return Ok(LikeResult::TargetNotFound);
        };
        let author_id: Uuid = row.get("author_id");
        let likes_count: i64 = row.get("likes_count");

        let inserted = sqlx::query(
            "INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, post_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(post_id)
        .execute(self.db.pool())
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(LikeResult::Duplicate);
        }

        self.counts.spawn_post_likes_recount(post_id);
        self.dispatch(NotificationEvent::liked_post(author_id, user_id, post_id))
            .await;
        Ok(LikeResult::Applied(likes_count + 1))
    }

    pub async fn unlike_post(&self, user_id: Uuid, post_id: Uuid) -> Result<UnlikeResult> {
        let Some(row) = sqlx::query(
            "SELECT author_id, likes_count FROM posts WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?
        else {
            return Ok(UnlikeResult::TargetNotFound);
        };
        let author_id: Uuid = row.get("author_id");
        let likes_count: i64 = row.get("likes_count");

        let deleted = sqlx::query("DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.db.pool())
            .await?;
        if deleted.rows_affected() == 0 {
            return Ok(UnlikeResult::Missing);
        }

        self.counts.spawn_post_likes_recount(post_id);
        self.retract(NotificationEvent::liked_post(author_id, user_id, post_id))
            .await;
        Ok(UnlikeResult::Applied((likes_count - 1).max(0)))
    }

    pub async fn like_comment(&self, user_id: Uuid, comment_id: Uuid) -> Result<LikeResult> {
        let Some(row) = sqlx::query(
            "SELECT author_id, post_id, likes_count FROM comments \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(comment_id)
        .fetch_optional(self.db.pool())
        .await?
        else {
            return Ok(LikeResult::TargetNotFound);
        };
        let author_id: Uuid = row.get("author_id");
        let post_id: Uuid = row.get("post_id");
        let likes_count: i64 = row.get("likes_count");

        let inserted = sqlx::query(
            "INSERT INTO comment_likes (user_id, comment_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, comment_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(comment_id)
        .execute(self.db.pool())
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(LikeResult::Duplicate);
        }

        self.counts.spawn_comment_likes_recount(comment_id);
        self.dispatch(NotificationEvent::liked_comment(
            author_id, user_id, post_id, comment_id,
        ))
        .await;
        Ok(LikeResult::Applied(likes_count + 1))
    }

    pub async fn unlike_comment(&self, user_id: Uuid, comment_id: Uuid) -> Result<UnlikeResult> {
        let Some(row) = sqlx::query(
            "SELECT author_id, post_id, likes_count FROM comments \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(comment_id)
        .fetch_optional(self.db.pool())
        .await?
        else {
            return Ok(UnlikeResult::TargetNotFound);
        };
        let author_id: Uuid = row.get("author_id");
        let post_id: Uuid = row.get("post_id");
        let likes_count: i64 = row.get("likes_count");

        let deleted =
            sqlx::query("DELETE FROM comment_likes WHERE user_id = $1 AND comment_id = $2")
                .bind(user_id)
                .bind(comment_id)
                .execute(self.db.pool())
                .await?;
        if deleted.rows_affected() == 0 {
            return Ok(UnlikeResult::Missing);
        }

        self.counts.spawn_comment_likes_recount(comment_id);
        self.retract(NotificationEvent::liked_comment(
            author_id, user_id, post_id, comment_id,
        ))
        .await;
        Ok(UnlikeResult::Applied((likes_count - 1).max(0)))
    }

    pub async fn create_comment(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        body: &str,
    ) -> Result<CommentCreateResult> {
        let Some(post_author_id) = sqlx::query_scalar::<_, Uuid>(
            "SELECT author_id FROM posts WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?
        else {
            return Ok(CommentCreateResult::PostNotFound);
        };

        let row = sqlx::query(
            "WITH inserted AS ( \
                 INSERT INTO comments (post_id, author_id, body) VALUES ($1, $2, $3) \
                 RETURNING id, post_id, author_id, body, likes_count, created_at \
             ) \
             SELECT i.id, i.post_id, i.author_id, i.body, i.likes_count, i.created_at, \
                    u.username, u.first_name, u.last_name, a.url AS avatar_url \
             FROM inserted i \
             JOIN users u ON u.id = i.author_id \
             LEFT JOIN media a ON a.id = u.avatar_media_id",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(body)
        .fetch_one(self.db.pool())
        .await?;

        let first_name: String = row.get("first_name");
        let last_name: String = row.get("last_name");
        let comment = Comment {
            id: row.get("id"),
            post_id: row.get("post_id"),
            author_id: row.get("author_id"),
            author_username: row.get("username"),
            author_full_name: full_name(&first_name, &last_name),
            author_avatar_url: row.get("avatar_url"),
            body: row.get("body"),
            likes_count: row.get("likes_count"),
            is_viewer_liked: false,
            created_at: row.get("created_at"),
        };

        self.counts.spawn_post_comments_recount(post_id);
        self.dispatch(NotificationEvent::commented_post(
            post_author_id,
            user_id,
            post_id,
            comment.id,
        ))
        .await;
        Ok(CommentCreateResult::Created(comment))
    }

    /// Comment author or post author may delete. Soft delete so existing
    /// likes rows keep a referent until cascade cleanup.
    pub async fn delete_comment(
        &self,
        actor_id: Uuid,
        comment_id: Uuid,
    ) -> Result<CommentDeleteResult> {
        let Some(row) = sqlx::query(
            "SELECT c.author_id, c.post_id, p.author_id AS post_author_id \
             FROM comments c \
             JOIN posts p ON p.id = c.post_id \
             WHERE c.id = $1 AND c.deleted_at IS NULL",
        )
        .bind(comment_id)
        .fetch_optional(self.db.pool())
        .await?
        else {
            return Ok(CommentDeleteResult::NotFound);
        };
        let author_id: Uuid = row.get("author_id");
        let post_id: Uuid = row.get("post_id");
        let post_author_id: Uuid = row.get("post_author_id");

        if actor_id != author_id && actor_id != post_author_id {
            return Ok(CommentDeleteResult::Forbidden);
        }

        sqlx::query("UPDATE comments SET deleted_at = now() WHERE id = $1")
            .bind(comment_id)
            .execute(self.db.pool())
            .await?;

        self.counts.spawn_post_comments_recount(post_id);
        self.retract(NotificationEvent::commented_post(
            post_author_id,
            author_id,
            post_id,
            comment_id,
        ))
        .await;
        Ok(CommentDeleteResult::Deleted)
    }

    pub async fn list_comments(
        &self,
        post_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<Option<(Vec<Comment>, i64)>> {
        let post_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(post_id)
        .fetch_one(self.db.pool())
        .await?;
        if !post_exists {
            return Ok(None);
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.author_id, c.body, c.likes_count, c.created_at, \
                    u.username, u.first_name, u.last_name, a.url AS avatar_url \
             FROM comments c \
             JOIN users u ON u.id = c.author_id \
             LEFT JOIN media a ON a.id = u.avatar_media_id \
             WHERE c.post_id = $1 AND c.deleted_at IS NULL \
             ORDER BY c.created_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(post_id)
        .bind(limit)
        .bind(offset(page, limit))
        .fetch_all(self.db.pool())
        .await?;

        let comments = rows
            .into_iter()
            .map(|row| {
                let first_name: String = row.get("first_name");
                let last_name: String = row.get("last_name");
                Comment {
                    id: row.get("id"),
                    post_id: row.get("post_id"),
                    author_id: row.get("author_id"),
                    author_username: row.get("username"),
                    author_full_name: full_name(&first_name, &last_name),
                    author_avatar_url: row.get("avatar_url"),
                    body: row.get("body"),
                    likes_count: row.get("likes_count"),
                    is_viewer_liked: false,
                    created_at: row.get("created_at"),
                }
            })
            .collect();
        Ok(Some((comments, total)))
    }

    pub async fn list_post_likers(
        &self,
        post_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<Option<(Vec<Profile>, i64)>> {
        let post_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(post_id)
        .fetch_one(self.db.pool())
        .await?;
        if !post_exists {
            return Ok(None);
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM post_likes pl \
             JOIN users u ON u.id = pl.user_id \
             WHERE pl.post_id = $1 AND u.deleted_at IS NULL",
        )
        .bind(post_id)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(
            "SELECT u.id, u.username, u.first_name, u.last_name, u.bio, u.created_at, \
                    a.url AS avatar_url, c.url AS cover_url, \
                    (SELECT COUNT(*) FROM follows WHERE followee_id = u.id) AS followers_count, \
                    (SELECT COUNT(*) FROM follows WHERE follower_id = u.id) AS following_count, \
                    (SELECT COUNT(*) FROM posts \
                     WHERE author_id = u.id AND deleted_at IS NULL) AS posts_count \
             FROM post_likes pl \
             JOIN users u ON u.id = pl.user_id \
             LEFT JOIN media a ON a.id = u.avatar_media_id \
             LEFT JOIN media c ON c.id = u.cover_media_id \
             WHERE pl.post_id = $1 AND u.deleted_at IS NULL \
             ORDER BY pl.created_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(post_id)
        .bind(limit)
        .bind(offset(page, limit))
        .fetch_all(self.db.pool())
        .await?;

        let profiles = rows.iter().map(map_profile_row).collect();
        Ok(Some((profiles, total)))
    }

    async fn dispatch(&self, event: NotificationEvent) {
        if let Err(err) = self.notifications.dispatch(event).await {
            tracing::warn!(error = ?err, "notification dispatch failed");
        }
    }

    async fn retract(&self, event: NotificationEvent) {
        if let Err(err) = self.notifications.retract(event).await {
            tracing::warn!(error = ?err, "notification retract failed");
        }
    }
}
