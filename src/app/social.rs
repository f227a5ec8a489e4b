use anyhow::Result;
use uuid::Uuid;

use crate::app::notifications::{NotificationEvent, NotificationService};
use crate::app::pagination::offset;
use crate::app::users::map_profile_row;
use crate::domain::user::Profile;
use crate::infra::db::Db;
use crate::infra::push::PushChannel;

pub enum FollowResult {
    Followed,
    AlreadyFollowing,
    UserNotFound,
}

pub enum UnfollowResult {
    Unfollowed,
    NotFollowing,
    UserNotFound,
}

#[derive(Clone)]
pub struct SocialService {
    db: Db,
    notifications: NotificationService,
}

impl SocialService {
    pub fn new(db: Db, push: PushChannel) -> Self {
        Self {
            notifications: NotificationService::new(db.clone(), push),
            db,
        }
    }

    pub async fn follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<FollowResult> {
        if !self.user_exists(followee_id).await? {
            return Ok(FollowResult::UserNotFound);
        }

        let inserted = sqlx::query(
            "INSERT INTO follows (follower_id, followee_id) VALUES ($1, $2) \
             ON CONFLICT (follower_id, followee_id) DO NOTHING",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(self.db.pool())
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(FollowResult::AlreadyFollowing);
        }

        if let Err(err) = self
            .notifications
            .dispatch(NotificationEvent::followed(followee_id, follower_id))
            .await
        {
            tracing::warn!(error = ?err, "follow notification dispatch failed");
        }
        Ok(FollowResult::Followed)
    }

    pub async fn unfollow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<UnfollowResult> {
        if !self.user_exists(followee_id).await? {
            return Ok(UnfollowResult::UserNotFound);
        }

        let deleted =
            sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
                .bind(follower_id)
                .bind(followee_id)
                .execute(self.db.pool())
                .await?;
        if deleted.rows_affected() == 0 {
            return Ok(UnfollowResult::NotFollowing);
        }

        if let Err(err) = self
            .notifications
            .retract(NotificationEvent::followed(followee_id, follower_id))
            .await
        {
            tracing::warn!(error = ?err, "follow notification retract failed");
        }
        Ok(UnfollowResult::Unfollowed)
    }

    pub async fn list_followers(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<Option<(Vec<Profile>, i64)>> {
        if !self.user_exists(user_id).await? {
            return Ok(None);
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM follows f \
             JOIN users u ON u.id = f.follower_id \
             WHERE f.followee_id = $1 AND u.deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(
            "SELECT u.id, u.username, u.first_name, u.last_name, u.bio, u.created_at, \
                    a.url AS avatar_url, c.url AS cover_url, \
                    (SELECT COUNT(*) FROM follows WHERE followee_id = u.id) AS followers_count, \
                    (SELECT COUNT(*) FROM follows WHERE follower_id = u.id) AS following_count, \
                    (SELECT COUNT(*) FROM posts \
                     WHERE author_id = u.id AND deleted_at IS NULL) AS posts_count \
             FROM follows f \
             JOIN users u ON u.id = f.follower_id \
             LEFT JOIN media a ON a.id = u.avatar_media_id \
             LEFT JOIN media c ON c.id = u.cover_media_id \
             WHERE f.followee_id = $1 AND u.deleted_at IS NULL \
             ORDER BY f.created_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset(page, limit))
        .fetch_all(self.db.pool())
        .await?;

        Ok(Some((rows.iter().map(map_profile_row).collect(), total)))
    }

    pub async fn list_following(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<Option<(Vec<Profile>, i64)>> {
        if !self.user_exists(user_id).await? {
            return Ok(None);
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM follows f \
             JOIN users u ON u.id = f.followee_id \
             WHERE f.follower_id = $1 AND u.deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(
            "SELECT u.id, u.username, u.first_name, u.last_name, u.bio, u.created_at, \
                    a.url AS avatar_url, c.url AS cover_url, \
                    (SELECT COUNT(*) FROM follows WHERE followee_id = u.id) AS followers_count, \
                    (SELECT COUNT(*) FROM follows WHERE follower_id = u.id) AS following_count, \
                    (SELECT COUNT(*) FROM posts \
                     WHERE author_id = u.id AND deleted_at IS NULL) AS posts_count \
             FROM follows f \
             JOIN users u ON u.id = f.followee_id \
             LEFT JOIN media a ON a.id = u.avatar_media_id \
             LEFT JOIN media c ON c.id = u.cover_media_id \
             WHERE f.follower_id = $1 AND u.deleted_at IS NULL \
             ORDER BY f.created_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset(page, limit))
        .fetch_all(self.db.pool())
        .await?;

        Ok(Some((rows.iter().map(map_profile_row).collect(), total)))
    }

    async fn user_exists(&self, user_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }
}
