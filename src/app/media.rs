use anyhow::Result;
use uuid::Uuid;

use crate::domain::media::Media;
use crate::infra::db::Db;
use crate::infra::storage::ObjectStorage;

pub enum UploadResult {
    Stored(Media),
    UnsupportedType,
    NotAnImage,
}

pub enum MediaDeleteResult {
    Deleted,
    NotFound,
    Forbidden,
}

#[derive(Clone)]
pub struct MediaService {
    db: Db,
    storage: ObjectStorage,
}

impl MediaService {
    pub fn new(db: Db, storage: ObjectStorage) -> Self {
        Self { db, storage }
    }

    /// Stores an uploaded image and records its row. Dimensions are probed
    /// from the bytes so clients cannot lie about them.
    pub async fn upload(
        &self,
        owner_id: Uuid,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<UploadResult> {
        let Some(ext) = extension_from_content_type(content_type) else {
            return Ok(UploadResult::UnsupportedType);
        };
        let Ok(decoded) = image::load_from_memory(&data) else {
            return Ok(UploadResult::NotAnImage);
        };
        let width = decoded.width() as i32;
        let height = decoded.height() as i32;
        let size = data.len() as i64;

        let media_id = Uuid::new_v4();
        let key = format!("media/{}/{}.{}", owner_id, media_id, ext);
        self.storage.put(&key, data, content_type).await?;

        let url = self.storage.public_url(&key);
        let created_at = sqlx::query_scalar(
            "INSERT INTO media (id, owner_id, url, format, width, height, size, public_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING created_at",
        )
        .bind(media_id)
        .bind(owner_id)
        .bind(&url)
        .bind(ext)
        .bind(width)
        .bind(height)
        .bind(size)
        .bind(&key)
        .fetch_one(self.db.pool())
        .await?;

        Ok(UploadResult::Stored(Media {
            id: media_id,
            owner_id,
            url,
            format: ext.to_string(),
            width,
            height,
            size,
            public_id: key,
            created_at,
        }))
    }

    pub async fn get(&self, media_id: Uuid) -> Result<Option<Media>> {
        let row = sqlx::query_as::<_, (Uuid, Uuid, String, String, i32, i32, i64, String, time::OffsetDateTime)>(
            "SELECT id, owner_id, url, format, width, height, size, public_id, created_at \
             FROM media WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(media_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(
            |(id, owner_id, url, format, width, height, size, public_id, created_at)| Media {
                id,
                owner_id,
                url,
                format,
                width,
                height,
                size,
                public_id,
                created_at,
            },
        ))
    }

    /// Soft deletes the row, then best-effort removes the object. A storage
    /// failure leaves an orphan object, not a dangling row.
    pub async fn delete(&self, owner_id: Uuid, media_id: Uuid) -> Result<MediaDeleteResult> {
        let Some(media) = self.get(media_id).await? else {
            return Ok(MediaDeleteResult::NotFound);
        };
        if media.owner_id != owner_id {
            return Ok(MediaDeleteResult::Forbidden);
        }

        sqlx::query("UPDATE media SET deleted_at = now() WHERE id = $1")
            .bind(media_id)
            .execute(self.db.pool())
            .await?;

        if let Err(err) = self.storage.delete(&media.public_id).await {
            tracing::warn!(error = ?err, key = %media.public_id, "object delete failed");
        }
        Ok(MediaDeleteResult::Deleted)
    }
}

fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_content_types_map_to_extensions() {
        assert_eq!(extension_from_content_type("image/jpeg"), Some("jpg"));
        assert_eq!(extension_from_content_type("image/png"), Some("png"));
        assert_eq!(extension_from_content_type("image/webp"), Some("webp"));
        assert_eq!(extension_from_content_type("application/pdf"), None);
    }
}
