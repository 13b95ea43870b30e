use sqlx::{FromRow, PgExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::enums::text_enum;

text_enum! {
    pub enum OtpPurpose {
        VerifyEmail => "verify_email",
        PasswordReset => "password_reset",
    }
}

/// Stored one-time code; only the keyed hash of the code is kept.
#[derive(Debug, Clone, FromRow)]
pub struct OtpCode {
    pub id: Uuid,
    pub email: String,
    pub code_hash: String,
    #[sqlx(try_from = "String")]
    pub purpose: OtpPurpose,
    pub expires_at: OffsetDateTime,
    pub used: bool,
    pub created_at: OffsetDateTime,
}

pub async fn insert<'e, E: PgExecutor<'e>>(
    ex: E,
    email: &str,
    code_hash: &str,
    purpose: OtpPurpose,
    expires_at: OffsetDateTime,
) -> sqlx::Result<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO otp_codes (email, code_hash, purpose, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(code_hash)
    .bind(purpose.as_str())
    .bind(expires_at)
    .fetch_one(ex)
    .await
}

/// Most recent unused, unexpired codes, newest first. Rows are locked so
/// concurrent confirmations for the same email serialize.
pub async fn recent_candidates<'e, E: PgExecutor<'e>>(
    ex: E,
    email: &str,
    purpose: OtpPurpose,
    limit: i64,
) -> sqlx::Result<Vec<OtpCode>> {
    sqlx::query_as::<_, OtpCode>(
        r#"
        SELECT id, email, code_hash, purpose, expires_at, used, created_at
          FROM otp_codes
         WHERE email = $1
           AND purpose = $2
           AND used = FALSE
           AND expires_at > now()
         ORDER BY created_at DESC
         LIMIT $3
         FOR UPDATE
        "#,
    )
    .bind(email)
    .bind(purpose.as_str())
    .bind(limit)
    .fetch_all(ex)
    .await
}

/// Marks every outstanding code of this purpose for the email as used.
pub async fn invalidate_all<'e, E: PgExecutor<'e>>(
    ex: E,
    email: &str,
    purpose: OtpPurpose,
) -> sqlx::Result<u64> {
    let res = sqlx::query(
        "UPDATE otp_codes SET used = TRUE WHERE email = $1 AND purpose = $2 AND used = FALSE",
    )
    .bind(email)
    .bind(purpose.as_str())
    .execute(ex)
    .await?;
    Ok(res.rows_affected())
}

pub async fn purge_expired<'e, E: PgExecutor<'e>>(ex: E) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM otp_codes WHERE expires_at < now()")
        .execute(ex)
        .await?;
    Ok(res.rows_affected())
}
