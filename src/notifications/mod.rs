pub mod handlers;
pub mod repo;

use axum::Router;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    handlers::notification_routes()
}

/// Best effort: a failed insert is logged and never fails the caller.
pub async fn notify(
    db: &PgPool,
    user_id: Uuid,
    kind: &str,
    title: &str,
    body: &str,
    link: Option<&str>,
) {
    if let Err(e) = repo::insert(db, user_id, kind, title, body, link).await {
        warn!(error = %e, %user_id, %kind, "notification not stored");
    }
}
