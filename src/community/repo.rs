use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::enums::text_enum;

text_enum! {
    pub enum ContentStatus {
        Visible => "visible",
        Hidden => "hidden",
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Thread {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub title: String,
    pub body: String,
    pub category: String,
    pub pinned: bool,
    pub replies_count: i32,
    #[sqlx(try_from = "String")]
    pub status: ContentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Reply {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub body: String,
    #[sqlx(try_from = "String")]
    pub status: ContentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const THREAD_SELECT: &str = r#"
    SELECT t.id, t.author_id, u.name AS author_name, t.title, t.body, t.category,
           t.pinned, t.replies_count, t.status, t.created_at, t.updated_at
      FROM threads t
      JOIN users u ON u.id = t.author_id
"#;

const REPLY_SELECT: &str = r#"
    SELECT r.id, r.thread_id, r.author_id, u.name AS author_name, r.body, r.status, r.created_at
      FROM thread_replies r
      JOIN users u ON u.id = r.author_id
"#;

pub async fn list(
    db: &PgPool,
    category: Option<&str>,
    q: Option<&str>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Thread>> {
    let sql = format!(
        r#"{THREAD_SELECT}
         WHERE t.status = 'visible'
           AND ($1::text IS NULL OR t.category = $1)
           AND ($2::text IS NULL OR t.title ILIKE '%' || $2 || '%' OR t.body ILIKE '%' || $2 || '%')
         ORDER BY t.pinned DESC, t.created_at DESC
         LIMIT $3 OFFSET $4
        "#
    );
    sqlx::query_as::<_, Thread>(&sql)
        .bind(category)
        .bind(q)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
}

pub async fn get<'e, E: PgExecutor<'e>>(ex: E, id: Uuid) -> sqlx::Result<Option<Thread>> {
    let sql = format!("{THREAD_SELECT} WHERE t.id = $1");
    sqlx::query_as::<_, Thread>(&sql)
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn create(
    db: &PgPool,
    author_id: Uuid,
    title: &str,
    body: &str,
    category: &str,
) -> sqlx::Result<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO threads (author_id, title, body, category)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(author_id)
    .bind(title)
    .bind(body)
    .bind(category)
    .fetch_one(db)
    .await
}

pub async fn update(
    db: &PgPool,
    id: Uuid,
    title: Option<&str>,
    body: Option<&str>,
    category: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE threads
           SET title = COALESCE($2, title),
               body = COALESCE($3, body),
               category = COALESCE($4, category),
               updated_at = now()
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(body)
    .bind(category)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn set_status(db: &PgPool, id: Uuid, status: ContentStatus) -> sqlx::Result<u64> {
    let res = sqlx::query("UPDATE threads SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}

pub async fn set_pinned(db: &PgPool, id: Uuid, pinned: bool) -> sqlx::Result<u64> {
    let res = sqlx::query("UPDATE threads SET pinned = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(pinned)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}

pub async fn list_replies(db: &PgPool, thread_id: Uuid) -> sqlx::Result<Vec<Reply>> {
    let sql = format!(
        "{REPLY_SELECT} WHERE r.thread_id = $1 AND r.status = 'visible' ORDER BY r.created_at ASC"
    );
    sqlx::query_as::<_, Reply>(&sql).bind(thread_id).fetch_all(db).await
}

pub async fn get_reply<'e, E: PgExecutor<'e>>(ex: E, id: Uuid) -> sqlx::Result<Option<Reply>> {
    let sql = format!("{REPLY_SELECT} WHERE r.id = $1");
    sqlx::query_as::<_, Reply>(&sql).bind(id).fetch_optional(ex).await
}

pub async fn insert_reply<'e, E: PgExecutor<'e>>(
    ex: E,
    thread_id: Uuid,
    author_id: Uuid,
    body: &str,
) -> sqlx::Result<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO thread_replies (thread_id, author_id, body) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(thread_id)
    .bind(author_id)
    .bind(body)
    .fetch_one(ex)
    .await
}

pub async fn hide_reply<'e, E: PgExecutor<'e>>(ex: E, id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query(
        "UPDATE thread_replies SET status = 'hidden' WHERE id = $1 AND status = 'visible'",
    )
    .bind(id)
    .execute(ex)
    .await?;
    Ok(res.rows_affected() == 1)
}

/// Adds `delta` to `replies_count`, never going below zero.
pub async fn bump_replies<'e, E: PgExecutor<'e>>(ex: E, thread_id: Uuid, delta: i32) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE threads SET replies_count = GREATEST(replies_count + $2, 0) WHERE id = $1",
    )
    .bind(thread_id)
    .bind(delta)
    .execute(ex)
    .await?;
    Ok(())
}
