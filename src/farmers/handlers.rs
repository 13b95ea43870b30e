use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::repo::{self, FarmerProfile, Review};
use crate::{
    auth::{claims::Role, extractors::AuthUser},
    error::{AppError, AppResult},
    notifications,
    response::{created, non_empty, ok, ApiJson, ApiQuery, Envelope, Pagination},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct FarmerFilter {
    pub specialty: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFarmerRequest {
    pub specialty: Option<String>,
    pub farm_name: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewCreated {
    pub review_id: Uuid,
    pub rating: f64,
    pub reviews_count: i32,
}

pub fn farmer_routes() -> Router<AppState> {
    Router::new()
        .route("/farmers", get(list_farmers))
        .route("/farmers/me", put(update_my_profile))
        .route("/farmers/:id", get(get_farmer))
        .route("/farmers/:id/reviews", get(list_reviews).post(add_review))
}

pub(crate) fn validate_review(farmer_id: Uuid, reviewer: &AuthUser, req: &ReviewRequest) -> AppResult<()> {
    if farmer_id == reviewer.id {
        return Err(AppError::bad_request("You cannot review yourself"));
    }
    if !(1..=5).contains(&req.rating) {
        return Err(AppError::bad_request("Rating must be between 1 and 5"));
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_farmers(
    State(state): State<AppState>,
    ApiQuery(p): ApiQuery<Pagination>,
    ApiQuery(f): ApiQuery<FarmerFilter>,
) -> AppResult<Json<Envelope<Vec<FarmerProfile>>>> {
    let specialty = non_empty(f.specialty);
    let farmers = repo::list(&state.db, specialty.as_deref(), p.limit(), p.offset()).await?;
    Ok(ok(farmers))
}

#[instrument(skip(state))]
pub async fn get_farmer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Envelope<FarmerProfile>>> {
    let farmer = repo::get(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Farmer"))?;
    Ok(ok(farmer))
}

#[instrument(skip(state, payload))]
pub async fn update_my_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<UpdateFarmerRequest>,
) -> AppResult<Json<Envelope<FarmerProfile>>> {
    auth.require(&[Role::Farmer])?;
    repo::upsert(
        &state.db,
        auth.id,
        non_empty(payload.specialty),
        non_empty(payload.farm_name),
        non_empty(payload.location),
    )
    .await?;
    let farmer = repo::get(&state.db, auth.id)
        .await?
        .ok_or_else(|| AppError::not_found("Farmer"))?;
    info!(user_id = %auth.id, "farmer profile updated");
    Ok(ok(farmer))
}

#[instrument(skip(state))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiQuery(p): ApiQuery<Pagination>,
) -> AppResult<Json<Envelope<Vec<Review>>>> {
    Ok(ok(repo::list_reviews(&state.db, id, p.limit(), p.offset()).await?))
}

#[instrument(skip(state, payload))]
pub async fn add_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<ReviewRequest>,
) -> AppResult<(StatusCode, Json<Envelope<ReviewCreated>>)> {
    validate_review(id, &auth, &payload)?;
    let comment = non_empty(payload.comment);

    let mut tx = state.db.begin().await?;
    if !repo::lock_active(&mut *tx, id).await? {
        return Err(AppError::not_found("Farmer"));
    }
    let review_id = match repo::insert_review(&mut *tx, id, auth.id, payload.rating, comment.as_deref()).await {
        Ok(rid) => rid,
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            warn!(farmer_id = %id, reviewer_id = %auth.id, "duplicate review");
            return Err(AppError::Conflict("You already reviewed this farmer".into()));
        }
        Err(e) => return Err(e.into()),
    };
    let (rating, reviews_count) = repo::refresh_rating(&mut *tx, id).await?;
    tx.commit().await?;

    notifications::notify(
        &state.db,
        id,
        "review",
        "New review",
        &format!("You received a {}-star review", payload.rating),
        Some(&format!("/farmers/{id}")),
    )
    .await;

    info!(farmer_id = %id, reviewer_id = %auth.id, rating, "review added");
    Ok(created(ReviewCreated {
        review_id,
        rating,
        reviews_count,
    }))
}
