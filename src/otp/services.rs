use anyhow::Context;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use sqlx::{PgConnection, PgPool};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use super::repo::{self, OtpCode, OtpPurpose};
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How many recent codes a submitted code is checked against.
pub const MAX_CANDIDATES: i64 = 5;
pub const CODE_LEN: usize = 6;

pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:0width$}", n, width = CODE_LEN)
}

fn mac(secret: &[u8], code: &str) -> anyhow::Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("otp hmac key: {e}"))?;
    mac.update(code.as_bytes());
    Ok(mac)
}

/// Hex HMAC-SHA256 of the code under the server secret.
pub fn hash_code(secret: &[u8], code: &str) -> anyhow::Result<String> {
    Ok(hex::encode(mac(secret, code)?.finalize().into_bytes()))
}

/// Constant-time comparison against a stored hex hash.
pub fn code_matches(secret: &[u8], code: &str, stored_hex: &str) -> bool {
    let Ok(expected) = hex::decode(stored_hex) else {
        return false;
    };
    mac(secret, code).is_ok_and(|m| m.verify_slice(&expected).is_ok())
}

pub fn find_match<'a>(secret: &[u8], code: &str, candidates: &'a [OtpCode]) -> Option<&'a OtpCode> {
    let code = code.trim();
    if code.len() != CODE_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    candidates
        .iter()
        .take(MAX_CANDIDATES as usize)
        .find(|c| code_matches(secret, code, &c.code_hash))
}

fn subject_and_body(purpose: OtpPurpose, code: &str, ttl_minutes: i64) -> (String, String) {
    match purpose {
        OtpPurpose::VerifyEmail => (
            "Verify your AgriReach email".to_string(),
            format!("Your verification code is {code}. It expires in {ttl_minutes} minutes."),
        ),
        OtpPurpose::PasswordReset => (
            "Reset your AgriReach password".to_string(),
            format!(
                "Your password reset code is {code}. It expires in {ttl_minutes} minutes. \
                 If you did not ask for a reset, ignore this email."
            ),
        ),
    }
}

/// Stores a fresh code for `email` and mails it.
pub async fn issue(state: &AppState, email: &str, purpose: OtpPurpose) -> anyhow::Result<()> {
    let code = generate_code();
    let secret = state.config.jwt.secret.as_bytes();
    let ttl = state.config.otp_ttl_minutes.max(1);
    let expires_at = OffsetDateTime::now_utc() + Duration::minutes(ttl);

    let code_hash = hash_code(secret, &code)?;
    repo::insert(&state.db, email, &code_hash, purpose, expires_at)
        .await
        .context("insert otp code")?;

    let (subject, body) = subject_and_body(purpose, &code, ttl);
    state
        .mailer
        .send(email, &subject, &body)
        .await
        .with_context(|| format!("send {purpose} code"))?;

    info!(%email, %purpose, "otp code issued");
    Ok(())
}

/// Checks `code` inside the caller's transaction; on a match every
/// outstanding code of this purpose is invalidated.
pub async fn consume(
    conn: &mut PgConnection,
    secret: &[u8],
    email: &str,
    purpose: OtpPurpose,
    code: &str,
) -> sqlx::Result<bool> {
    let candidates = repo::recent_candidates(&mut *conn, email, purpose, MAX_CANDIDATES).await?;
    if find_match(secret, code, &candidates).is_none() {
        debug!(%email, %purpose, candidates = candidates.len(), "otp code mismatch");
        return Ok(false);
    }
    repo::invalidate_all(&mut *conn, email, purpose).await?;
    Ok(true)
}

/// Deletes expired codes every `every` until the process exits.
pub fn spawn_purge_task(db: PgPool, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match repo::purge_expired(&db).await {
                Ok(n) if n > 0 => info!(removed = n, "expired otp codes purged"),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "otp purge failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const SECRET: &[u8] = b"otp-test-secret";

    fn stored(code: &str, minutes_ago: i64) -> OtpCode {
        let now = OffsetDateTime::now_utc();
        OtpCode {
            id: Uuid::new_v4(),
            email: "a@b.co".into(),
            code_hash: hash_code(SECRET, code).unwrap(),
            purpose: OtpPurpose::VerifyEmail,
            expires_at: now + Duration::minutes(10 - minutes_ago),
            used: false,
            created_at: now - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..50 {
            let c = generate_code();
            assert_eq!(c.len(), CODE_LEN);
            assert!(c.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn hash_is_keyed_and_not_plaintext() {
        let h = hash_code(SECRET, "123456").unwrap();
        assert_eq!(h.len(), 64);
        assert!(!h.contains("123456"));
        assert_ne!(h, hash_code(b"other-secret", "123456").unwrap());
        assert!(code_matches(SECRET, "123456", &h));
        assert!(!code_matches(SECRET, "654321", &h));
        assert!(!code_matches(SECRET, "123456", "zz-not-hex"));
    }

    #[test]
    fn matches_any_of_recent_candidates() {
        let candidates = vec![stored("111111", 0), stored("222222", 1), stored("333333", 2)];
        let hit = find_match(SECRET, "222222", &candidates).expect("match");
        assert_eq!(hit.id, candidates[1].id);
        assert!(find_match(SECRET, " 333333 ", &candidates).is_some());
        assert!(find_match(SECRET, "444444", &candidates).is_none());
    }

    #[test]
    fn only_first_five_candidates_are_considered() {
        let mut candidates: Vec<OtpCode> = (0..5).map(|i| stored(&format!("00000{i}"), i)).collect();
        candidates.push(stored("999999", 6));
        assert!(find_match(SECRET, "000004", &candidates).is_some());
        assert!(find_match(SECRET, "999999", &candidates).is_none());
    }

    #[test]
    fn malformed_codes_never_match() {
        let candidates = vec![stored("123456", 0)];
        assert!(find_match(SECRET, "12345", &candidates).is_none());
        assert!(find_match(SECRET, "12345a", &candidates).is_none());
        assert!(find_match(SECRET, "", &candidates).is_none());
    }

    #[test]
    fn reset_mail_mentions_code_and_ttl() {
        let (subject, body) = subject_and_body(OtpPurpose::PasswordReset, "042042", 10);
        assert!(subject.contains("Reset"));
        assert!(body.contains("042042"));
        assert!(body.contains("10 minutes"));
    }
}
