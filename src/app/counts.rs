use anyhow::Result;
use uuid::Uuid;

use crate::infra::db::Db;

/// Recomputes denormalized counters from the authoritative join/child
/// tables. Callers run these detached: the HTTP response carries an
/// optimistically adjusted count and the recompute converges it afterwards.
#[derive(Clone)]
pub struct CountMaintainer {
    db: Db,
}

impl CountMaintainer {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn spawn_post_likes_recount(&self, post_id: Uuid) {
        let maintainer = self.clone();
        tokio::spawn(async move {
            if let Err(err) = maintainer.recount_post_likes(post_id).await {
                tracing::warn!(error = ?err, post_id = %post_id, "post likes recount failed");
            }
        });
    }

    pub fn spawn_post_comments_recount(&self, post_id: Uuid) {
        let maintainer = self.clone();
        tokio::spawn(async move {
            if let Err(err) = maintainer.recount_post_comments(post_id).await {
                tracing::warn!(error = ?err, post_id = %post_id, "post comments recount failed");
            }
        });
    }

    pub fn spawn_comment_likes_recount(&self, comment_id: Uuid) {
        let maintainer = self.clone();
        tokio::spawn(async move {
            if let Err(err) = maintainer.recount_comment_likes(comment_id).await {
                tracing::warn!(error = ?err, comment_id = %comment_id, "comment likes recount failed");
            }
        });
    }

    pub async fn recount_post_likes(&self, post_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE posts \
             SET likes_count = (SELECT COUNT(*) FROM post_likes WHERE post_id = $1) \
             WHERE id = $1",
        )
        .bind(post_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn recount_post_comments(&self, post_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE posts \
             SET comments_count = (SELECT COUNT(*) FROM comments \
                                   WHERE post_id = $1 AND deleted_at IS NULL) \
             WHERE id = $1",
        )
        .bind(post_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn recount_comment_likes(&self, comment_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE comments \
             SET likes_count = (SELECT COUNT(*) FROM comment_likes WHERE comment_id = $1) \
             WHERE id = $1",
        )
        .bind(comment_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}
