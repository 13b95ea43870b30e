use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_message_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Conversation {
    pub fn includes(&self, user_id: Uuid) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    pub fn peer_of(&self, user_id: Uuid) -> Uuid {
        if self.user_a == user_id {
            self.user_b
        } else {
            self.user_a
        }
    }
}

/// A conversation as listed for one participant.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub peer_id: Uuid,
    pub peer_name: String,
    pub peer_avatar_url: Option<String>,
    pub last_message: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_message_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Orders a pair so `(a, b)` and `(b, a)` land on the same row.
pub fn canonical_pair(x: Uuid, y: Uuid) -> (Uuid, Uuid) {
    if x < y {
        (x, y)
    } else {
        (y, x)
    }
}

pub async fn get_or_create(db: &PgPool, x: Uuid, y: Uuid) -> sqlx::Result<Conversation> {
    let (a, b) = canonical_pair(x, y);
    // The no-op update makes RETURNING yield the existing row on conflict.
    sqlx::query_as::<_, Conversation>(
        r#"
        INSERT INTO conversations (user_a, user_b)
        VALUES ($1, $2)
        ON CONFLICT (user_a, user_b) DO UPDATE SET user_a = EXCLUDED.user_a
        RETURNING id, user_a, user_b, last_message_at, created_at
        "#,
    )
    .bind(a)
    .bind(b)
    .fetch_one(db)
    .await
}

pub async fn get(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Conversation>> {
    sqlx::query_as::<_, Conversation>(
        "SELECT id, user_a, user_b, last_message_at, created_at FROM conversations WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn list_for(db: &PgPool, user_id: Uuid, limit: i64, offset: i64) -> sqlx::Result<Vec<ConversationSummary>> {
    sqlx::query_as::<_, ConversationSummary>(
        r#"
        SELECT c.id,
               u.id AS peer_id,
               u.name AS peer_name,
               u.avatar_url AS peer_avatar_url,
               (SELECT m.body FROM messages m
                 WHERE m.conversation_id = c.id
                 ORDER BY m.created_at DESC LIMIT 1) AS last_message,
               c.last_message_at
          FROM conversations c
          JOIN users u ON u.id = CASE WHEN c.user_a = $1 THEN c.user_b ELSE c.user_a END
         WHERE c.user_a = $1 OR c.user_b = $1
         ORDER BY c.last_message_at DESC NULLS LAST, c.created_at DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

/// Newest first.
pub async fn list_messages(db: &PgPool, conversation_id: Uuid, limit: i64, offset: i64) -> sqlx::Result<Vec<Message>> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT id, conversation_id, sender_id, body, created_at
          FROM messages
         WHERE conversation_id = $1
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(conversation_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn insert_message(db: &PgPool, conversation_id: Uuid, sender_id: Uuid, body: &str) -> sqlx::Result<Message> {
    sqlx::query_as::<_, Message>(
        r#"
        WITH msg AS (
            INSERT INTO messages (conversation_id, sender_id, body)
            VALUES ($1, $2, $3)
            RETURNING id, conversation_id, sender_id, body, created_at
        ), bump AS (
            UPDATE conversations SET last_message_at = (SELECT created_at FROM msg)
             WHERE id = $1
        )
        SELECT * FROM msg
        "#,
    )
    .bind(conversation_id)
    .bind(sender_id)
    .bind(body)
    .fetch_one(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_order_is_symmetric() {
        let (x, y) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(canonical_pair(x, y), canonical_pair(y, x));
        let (a, b) = canonical_pair(x, y);
        assert!(a < b);
    }

    #[test]
    fn peer_lookup() {
        let (a, b) = canonical_pair(Uuid::new_v4(), Uuid::new_v4());
        let c = Conversation {
            id: Uuid::new_v4(),
            user_a: a,
            user_b: b,
            last_message_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        assert_eq!(c.peer_of(a), b);
        assert_eq!(c.peer_of(b), a);
        assert!(c.includes(a));
        assert!(!c.includes(Uuid::new_v4()));
    }
}
