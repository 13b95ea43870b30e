use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::enums::text_enum;

text_enum! {
    pub enum UploadKind {
        Image => "image",
        Document => "document",
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Upload {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub key: String,
    pub url: String,
    #[sqlx(try_from = "String")]
    pub kind: UploadKind,
    pub content_type: String,
    pub size_bytes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub struct NewUpload<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key: &'a str,
    pub url: &'a str,
    pub kind: UploadKind,
    pub content_type: &'a str,
    pub size_bytes: i64,
}

pub async fn insert(db: &PgPool, u: NewUpload<'_>) -> sqlx::Result<Upload> {
    sqlx::query_as::<_, Upload>(
        r#"
        INSERT INTO uploads (id, user_id, key, url, kind, content_type, size_bytes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, user_id, key, url, kind, content_type, size_bytes, created_at
        "#,
    )
    .bind(u.id)
    .bind(u.user_id)
    .bind(u.key)
    .bind(u.url)
    .bind(u.kind.as_str())
    .bind(u.content_type)
    .bind(u.size_bytes)
    .fetch_one(db)
    .await
}

pub async fn list_for(db: &PgPool, user_id: Uuid, limit: i64, offset: i64) -> sqlx::Result<Vec<Upload>> {
    sqlx::query_as::<_, Upload>(
        r#"
        SELECT id, user_id, key, url, kind, content_type, size_bytes, created_at
          FROM uploads
         WHERE user_id = $1
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn get(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Upload>> {
    sqlx::query_as::<_, Upload>(
        "SELECT id, user_id, key, url, kind, content_type, size_bytes, created_at FROM uploads WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM uploads WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
