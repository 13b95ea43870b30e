use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::claims::Role, enums::text_enum};

text_enum! {
    pub enum UserStatus {
        Active => "active",
        Suspended => "suspended",
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub verified: bool,
    #[sqlx(try_from = "String")]
    pub status: UserStatus,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name: &'a str,
    pub role: Role,
}

#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl User {
    pub fn is_suspended(&self) -> bool {
        self.status == UserStatus::Suspended
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(ex: E, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(ex)
            .await
    }

    pub async fn create<'e, E: PgExecutor<'e>>(ex: E, new: NewUser<'_>) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.name)
        .bind(new.role.as_str())
        .fetch_one(ex)
        .await
    }

    pub async fn update_profile(db: &PgPool, id: Uuid, c: ProfileChanges) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   phone = COALESCE($3, phone),
                   location = COALESCE($4, location),
                   bio = COALESCE($5, bio),
                   avatar_url = COALESCE($6, avatar_url),
                   updated_at = now()
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(c.name)
        .bind(c.phone)
        .bind(c.location)
        .bind(c.bio)
        .bind(c.avatar_url)
        .fetch_one(db)
        .await
    }

    /// Flips `verified` only if it was false; returns whether this call did it.
    pub async fn mark_verified<'e, E: PgExecutor<'e>>(ex: E, email: &str) -> sqlx::Result<bool> {
        let res = sqlx::query(
            "UPDATE users SET verified = TRUE, updated_at = now() WHERE email = $1 AND verified = FALSE",
        )
        .bind(email)
        .execute(ex)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    pub async fn set_password<'e, E: PgExecutor<'e>>(
        ex: E,
        email: &str,
        password_hash: &str,
    ) -> sqlx::Result<bool> {
        let res = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = now() WHERE email = $1",
        )
        .bind(email)
        .bind(password_hash)
        .execute(ex)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    pub async fn set_status(db: &PgPool, id: Uuid, status: UserStatus) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_one(db)
        .await
    }

    pub async fn set_verified(db: &PgPool, id: Uuid) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET verified = TRUE, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_one(db)
        .await
    }

    pub async fn list(
        db: &PgPool,
        role: Option<Role>,
        status: Option<UserStatus>,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
             WHERE ($1::text IS NULL OR role = $1)
               AND ($2::text IS NULL OR status = $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4
            "#,
        )
        .bind(role.map(|r| r.as_str()))
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn exists_active(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND status = 'active')",
        )
        .bind(id)
        .fetch_one(db)
        .await
    }
}
