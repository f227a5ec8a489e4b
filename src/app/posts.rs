use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::pagination::offset;
use crate::domain::post::Post;
use crate::domain::user::full_name;
use crate::infra::db::Db;

pub const MAX_POST_LEN: usize = 5000;

pub enum PostCreateResult {
    Created(Post),
    MediaNotOwned,
}

pub enum PostUpdateResult {
    Updated(Post),
    NotFound,
    Forbidden,
}

pub enum PostDeleteResult {
    Deleted,
    NotFound,
    Forbidden,
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        author_id: Uuid,
        body: &str,
        media_id: Option<Uuid>,
    ) -> Result<PostCreateResult> {
        if let Some(media_id) = media_id {
            let owned: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM media \
                 WHERE id = $1 AND owner_id = $2 AND deleted_at IS NULL)",
            )
            .bind(media_id)
            .bind(author_id)
            .fetch_one(self.db.pool())
            .await?;
            if !owned {
                return Ok(PostCreateResult::MediaNotOwned);
            }
        }

        let post_id: Uuid = sqlx::query_scalar(
            "INSERT INTO posts (author_id, body, media_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(author_id)
        .bind(body)
        .bind(media_id)
        .fetch_one(self.db.pool())
        .await?;

        let post = self
            .get(post_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("post vanished after insert"))?;
        Ok(PostCreateResult::Created(post))
    }

    pub async fn get(&self, post_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(&post_query("p.id = $1"))
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.as_ref().map(map_post_row))
    }

    pub async fn update_body(
        &self,
        actor_id: Uuid,
        post_id: Uuid,
        body: &str,
    ) -> Result<PostUpdateResult> {
        let Some(author_id) = sqlx::query_scalar::<_, Uuid>(
            "SELECT author_id FROM posts WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?
        else {
            return Ok(PostUpdateResult::NotFound);
        };
        if author_id != actor_id {
            return Ok(PostUpdateResult::Forbidden);
        }

        sqlx::query("UPDATE posts SET body = $2, updated_at = now() WHERE id = $1")
            .bind(post_id)
            .bind(body)
            .execute(self.db.pool())
            .await?;

        let post = self
            .get(post_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("post vanished after update"))?;
        Ok(PostUpdateResult::Updated(post))
    }

    pub async fn delete(&self, actor_id: Uuid, post_id: Uuid) -> Result<PostDeleteResult> {
        let Some(author_id) = sqlx::query_scalar::<_, Uuid>(
            "SELECT author_id FROM posts WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?
        else {
            return Ok(PostDeleteResult::NotFound);
        };
        if author_id != actor_id {
            return Ok(PostDeleteResult::Forbidden);
        }

        sqlx::query("UPDATE posts SET deleted_at = now() WHERE id = $1")
            .bind(post_id)
            .execute(self.db.pool())
            .await?;
        Ok(PostDeleteResult::Deleted)
    }

    pub async fn list_by_author(
        &self,
        author_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<Option<(Vec<Post>, i64)>> {
        let author_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(author_id)
        .fetch_one(self.db.pool())
        .await?;
        if !author_exists {
            return Ok(None);
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts WHERE author_id = $1 AND deleted_at IS NULL",
        )
        .bind(author_id)
        .fetch_one(self.db.pool())
        .await?;

        let query = format!(
            "{} ORDER BY p.created_at DESC LIMIT $2 OFFSET $3",
            post_query("p.author_id = $1")
        );
        let rows = sqlx::query(&query)
            .bind(author_id)
            .bind(limit)
            .bind(offset(page, limit))
            .fetch_all(self.db.pool())
            .await?;

        Ok(Some((rows.iter().map(map_post_row).collect(), total)))
    }

    /// Reverse-chronological feed across all live authors.
    pub async fn feed(&self, page: i64, limit: i64) -> Result<(Vec<Post>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts p \
             JOIN users u ON u.id = p.author_id \
             WHERE p.deleted_at IS NULL AND u.deleted_at IS NULL",
        )
        .fetch_one(self.db.pool())
        .await?;

        let query = format!(
            "{} ORDER BY p.created_at DESC LIMIT $1 OFFSET $2",
            post_query("TRUE")
        );
        let rows = sqlx::query(&query)
            .bind(limit)
            .bind(offset(page, limit))
            .fetch_all(self.db.pool())
            .await?;

        Ok((rows.iter().map(map_post_row).collect(), total))
    }
}

fn post_query(filter: &str) -> String {
    format!(
        "SELECT p.id, p.author_id, p.body, p.media_id, p.likes_count, p.comments_count, \
                p.created_at, p.updated_at, \
                u.username, u.first_name, u.last_name, \
                a.url AS avatar_url, m.url AS image_url \
         FROM posts p \
         JOIN users u ON u.id = p.author_id \
         LEFT JOIN media a ON a.id = u.avatar_media_id \
         LEFT JOIN media m ON m.id = p.media_id \
         WHERE p.deleted_at IS NULL AND u.deleted_at IS NULL AND {filter}"
    )
}

fn map_post_row(row: &PgRow) -> Post {
    let first_name: String = row.get("first_name");
    let last_name: String = row.get("last_name");
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        author_username: row.get("username"),
        author_full_name: full_name(&first_name, &last_name),
        author_avatar_url: row.get("avatar_url"),
        body: row.get("body"),
        media_id: row.get("media_id"),
        image_url: row.get("image_url"),
        likes_count: row.get("likes_count"),
        comments_count: row.get("comments_count"),
        is_viewer_liked: false,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
