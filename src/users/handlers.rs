use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{PublicProfile, PublicUser, UpdateProfileRequest},
    repo::{ProfileChanges, User},
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    response::{ok, ApiJson, Envelope},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", put(update_me))
        .route("/users/:id", get(get_user))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Envelope<PublicProfile>>> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .filter(|u| !u.is_suspended())
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(ok(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<Envelope<PublicUser>>> {
    let name = match payload.name {
        Some(n) if n.trim().is_empty() => return Err(AppError::bad_request("Name cannot be empty")),
        Some(n) => Some(n.trim().to_string()),
        None => None,
    };
    let changes = ProfileChanges {
        name,
        phone: payload.phone,
        location: payload.location,
        bio: payload.bio,
        avatar_url: payload.avatar_url,
    };
    let user = User::update_profile(&state.db, auth.id, changes).await?;
    info!(user_id = %user.id, "profile updated");
    Ok(ok(user.into()))
}
