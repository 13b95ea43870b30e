use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo::{self, ContentStatus, Reply, Thread};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    notifications,
    response::{created, non_empty, ok, ApiJson, ApiQuery, Envelope, Pagination},
    state::AppState,
};

pub const DEFAULT_CATEGORY: &str = "general";
const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ThreadFilter {
    pub category: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateThreadRequest {
    pub title: String,
    pub body: String,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateThreadRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct ThreadWithReplies {
    #[serde(flatten)]
    pub thread: Thread,
    pub replies: Vec<Reply>,
}

pub fn community_routes() -> Router<AppState> {
    Router::new()
        .route("/community/threads", get(list_threads).post(create_thread))
        .route(
            "/community/threads/:id",
            get(get_thread).put(update_thread).delete(delete_thread),
        )
        .route("/community/threads/:id/replies", post(add_reply))
        .route("/community/threads/:id/replies/:reply_id", delete(delete_reply))
}

/// Lowercased slug; blank falls back to the default category.
pub fn normalize_category(category: Option<String>) -> String {
    non_empty(category)
        .map(|c| c.to_lowercase())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

fn check_title(title: &str) -> AppResult<()> {
    if title.is_empty() {
        return Err(AppError::bad_request("Title is required"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::bad_request("Title is too long"));
    }
    Ok(())
}

async fn load_visible(state: &AppState, id: Uuid) -> AppResult<Thread> {
    repo::get(&state.db, id)
        .await?
        .filter(|t| t.status == ContentStatus::Visible)
        .ok_or_else(|| AppError::not_found("Thread"))
}

#[instrument(skip(state))]
pub async fn list_threads(
    State(state): State<AppState>,
    ApiQuery(p): ApiQuery<Pagination>,
    ApiQuery(f): ApiQuery<ThreadFilter>,
) -> AppResult<Json<Envelope<Vec<Thread>>>> {
    let category = non_empty(f.category).map(|c| c.to_lowercase());
    let q = non_empty(f.q);
    let threads = repo::list(&state.db, category.as_deref(), q.as_deref(), p.limit(), p.offset()).await?;
    Ok(ok(threads))
}

#[instrument(skip(state))]
pub async fn get_thread(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Envelope<ThreadWithReplies>>> {
    let thread = load_visible(&state, id).await?;
    let replies = repo::list_replies(&state.db, id).await?;
    Ok(ok(ThreadWithReplies { thread, replies }))
}

#[instrument(skip(state, payload))]
pub async fn create_thread(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<CreateThreadRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Thread>>)> {
    let title = payload.title.trim();
    let body = payload.body.trim();
    check_title(title)?;
    if body.is_empty() {
        return Err(AppError::bad_request("Body is required"));
    }
    let category = normalize_category(payload.category);

    let id = repo::create(&state.db, auth.id, title, body, &category).await?;
    let thread = load_visible(&state, id).await?;
    info!(thread_id = %id, author_id = %auth.id, %category, "thread created");
    Ok(created(thread))
}

#[instrument(skip(state, payload))]
pub async fn update_thread(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateThreadRequest>,
) -> AppResult<Json<Envelope<Thread>>> {
    let thread = load_visible(&state, id).await?;
    if thread.author_id != auth.id {
        return Err(AppError::forbidden("Only the author can edit this thread"));
    }
    let title = payload.title.as_deref().map(str::trim);
    if let Some(t) = title {
        check_title(t)?;
    }
    let body = payload.body.as_deref().map(str::trim);
    if body == Some("") {
        return Err(AppError::bad_request("Body cannot be empty"));
    }
    let category = payload.category.map(|c| normalize_category(Some(c)));

    repo::update(&state.db, id, title, body, category.as_deref()).await?;
    Ok(ok(load_visible(&state, id).await?))
}

#[instrument(skip(state))]
pub async fn delete_thread(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let thread = load_visible(&state, id).await?;
    auth.require_owner(thread.author_id)?;
    repo::set_status(&state.db, id, ContentStatus::Hidden).await?;
    info!(thread_id = %id, by = %auth.id, "thread hidden");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn add_reply(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<ReplyRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Reply>>)> {
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(AppError::bad_request("Reply cannot be empty"));
    }
    let thread = load_visible(&state, id).await?;

    let mut tx = state.db.begin().await?;
    let reply_id = repo::insert_reply(&mut *tx, id, auth.id, body).await?;
    repo::bump_replies(&mut *tx, id, 1).await?;
    let reply = repo::get_reply(&mut *tx, reply_id)
        .await?
        .ok_or_else(|| AppError::not_found("Reply"))?;
    tx.commit().await?;

    if thread.author_id != auth.id {
        notifications::notify(
            &state.db,
            thread.author_id,
            "reply",
            "New reply",
            &format!("{} replied to \"{}\"", reply.author_name, thread.title),
            Some(&format!("/community/threads/{id}")),
        )
        .await;
    }

    info!(thread_id = %id, reply_id = %reply.id, "reply added");
    Ok(created(reply))
}

#[instrument(skip(state))]
pub async fn delete_reply(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, reply_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let reply = repo::get_reply(&state.db, reply_id)
        .await?
        .filter(|r| r.thread_id == id && r.status == ContentStatus::Visible)
        .ok_or_else(|| AppError::not_found("Reply"))?;
    auth.require_owner(reply.author_id)?;

    let mut tx = state.db.begin().await?;
    if repo::hide_reply(&mut *tx, reply_id).await? {
        repo::bump_replies(&mut *tx, id, -1).await?;
    }
    tx.commit().await?;

    info!(thread_id = %id, %reply_id, by = %auth.id, "reply hidden");
    Ok(StatusCode::NO_CONTENT)
}
