use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::{full_name, Profile, User};
use crate::infra::db::Db;

/// Fields accepted by a profile update. `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_media_id: Option<Uuid>,
    pub cover_media_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let row = sqlx::query(
            "SELECT u.id, u.username, u.first_name, u.last_name, u.bio, u.created_at, \
                    a.url AS avatar_url, c.url AS cover_url, \
                    (SELECT COUNT(*) FROM follows WHERE followee_id = u.id) AS followers_count, \
                    (SELECT COUNT(*) FROM follows WHERE follower_id = u.id) AS following_count, \
                    (SELECT COUNT(*) FROM posts \
                     WHERE author_id = u.id AND deleted_at IS NULL) AS posts_count \
             FROM users u \
             LEFT JOIN media a ON a.id = u.avatar_media_id \
             LEFT JOIN media c ON c.id = u.cover_media_id \
             WHERE u.id = $1 AND u.deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(map_profile_row))
    }

    /// Self view, includes email. Only reachable behind auth.
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.bio, \
                    u.email_verified_at, u.created_at, \
                    a.url AS avatar_url, c.url AS cover_url \
             FROM users u \
             LEFT JOIN media a ON a.id = u.avatar_media_id \
             LEFT JOIN media c ON c.id = u.cover_media_id \
             WHERE u.id = $1 AND u.deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| {
            let first_name: String = row.get("first_name");
            let last_name: String = row.get("last_name");
            let email_verified_at: Option<OffsetDateTime> = row.get("email_verified_at");
            User {
                id: row.get("id"),
                username: row.get("username"),
                email: row.get("email"),
                full_name: full_name(&first_name, &last_name),
                first_name,
                last_name,
                bio: row.get("bio"),
                has_email_verified: email_verified_at.is_some(),
                avatar_url: row.get("avatar_url"),
                cover_url: row.get("cover_url"),
                created_at: row.get("created_at"),
            }
        }))
    }

    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<Option<User>> {
        sqlx::query(
            "UPDATE users SET \
                 first_name = COALESCE($2, first_name), \
                 last_name = COALESCE($3, last_name), \
                 bio = COALESCE($4, bio), \
                 avatar_media_id = COALESCE($5, avatar_media_id), \
                 cover_media_id = COALESCE($6, cover_media_id), \
                 updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.bio)
        .bind(update.avatar_media_id)
        .bind(update.cover_media_id)
        .execute(self.db.pool())
        .await?;

        self.get_user(user_id).await
    }

    /// Soft delete. Partial unique indexes free the username and email for
    /// re-registration.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        sqlx::query("UPDATE refresh_tokens SET revoked_at = now() WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

/// Maps the shared profile projection used by user, follower and liker
/// listings. Expects the count subselect aliases and joined media urls.
pub(crate) fn map_profile_row(row: &PgRow) -> Profile {
    let first_name: String = row.get("first_name");
    let last_name: String = row.get("last_name");
    Profile {
        id: row.get("id"),
        username: row.get("username"),
        full_name: full_name(&first_name, &last_name),
        bio: row.get("bio"),
        avatar_url: row.get("avatar_url"),
        cover_url: row.get("cover_url"),
        created_at: row.get("created_at"),
        followers_count: row.get("followers_count"),
        following_count: row.get("following_count"),
        posts_count: row.get("posts_count"),
        is_viewer_follow: false,
    }
}
