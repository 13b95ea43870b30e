use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use super::repo::{self, Notification};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    response::{ok, ApiQuery, Envelope, Pagination},
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub items: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct Updated {
    pub updated: u64,
}

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", put(mark_all_read))
        .route("/notifications/:id/read", put(mark_read))
}

#[instrument(skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(p): ApiQuery<Pagination>,
    ApiQuery(f): ApiQuery<NotificationFilter>,
) -> AppResult<Json<Envelope<NotificationList>>> {
    let items = repo::list(&state.db, auth.id, f.unread, p.limit(), p.offset()).await?;
    let unread_count = repo::unread_count(&state.db, auth.id).await?;
    Ok(ok(NotificationList { items, unread_count }))
}

#[instrument(skip(state))]
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Envelope<Notification>>> {
    let n = repo::mark_read(&state.db, auth.id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Notification"))?;
    Ok(ok(n))
}

#[instrument(skip(state))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Envelope<Updated>>> {
    let updated = repo::mark_all_read(&state.db, auth.id).await?;
    Ok(ok(Updated { updated }))
}
