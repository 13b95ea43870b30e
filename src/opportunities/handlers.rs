use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        ApplicationStatusRequest, ApplyRequest, CreateOpportunityRequest, OpportunityFilter,
        StatusActionRequest, UpdateOpportunityRequest,
    },
    repo::{self, ApplicationDetail, NewOpportunity, Opportunity, OpportunityChanges, OpportunitySearch},
    services::{
        check_application_transition, check_can_apply, check_not_moderated, normalize_skills, visible_to,
        ApplicationStatus, StatusAction,
    },
};
use crate::{
    auth::{claims::Role, extractors::AuthUser},
    error::{AppError, AppResult},
    notifications,
    response::{created, non_empty, ok, ApiJson, ApiQuery, Envelope, Pagination},
    state::AppState,
};

pub fn opportunity_routes() -> Router<AppState> {
    Router::new()
        .route("/opportunities", get(list_opportunities).post(create_opportunity))
        .route("/opportunities/mine", get(my_opportunities))
        .route("/opportunities/:id", get(get_opportunity).put(update_opportunity))
        .route("/opportunities/:id/status", put(change_status))
        .route("/opportunities/:id/apply", post(apply))
        .route("/opportunities/:id/applications", get(list_applications))
        .route("/opportunities/:id/applications/:app_id", put(decide_application))
        .route("/applications/mine", get(my_applications))
        .route("/applications/:id", delete(withdraw_application))
}

const POSTERS: &[Role] = &[Role::Recruiter, Role::Admin];

async fn load(state: &AppState, id: Uuid) -> AppResult<Opportunity> {
    repo::get(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Opportunity"))
}

/// Loads a posting the caller owns; hidden postings of others stay 404.
async fn load_owned(state: &AppState, auth: &AuthUser, id: Uuid) -> AppResult<Opportunity> {
    let opp = load(state, id).await?;
    if !visible_to(&opp, Some(auth)) {
        return Err(AppError::not_found("Opportunity"));
    }
    auth.require_owner(opp.recruiter_id)?;
    Ok(opp)
}

fn check_deadline(deadline: Option<OffsetDateTime>) -> AppResult<()> {
    if matches!(deadline, Some(d) if d < OffsetDateTime::now_utc()) {
        return Err(AppError::bad_request("Deadline is in the past"));
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_opportunities(
    State(state): State<AppState>,
    ApiQuery(p): ApiQuery<Pagination>,
    ApiQuery(f): ApiQuery<OpportunityFilter>,
) -> AppResult<Json<Envelope<Vec<Opportunity>>>> {
    let search = OpportunitySearch {
        q: non_empty(f.q),
        skill: non_empty(f.skill).map(|s| s.to_lowercase()),
        location: non_empty(f.location),
    };
    Ok(ok(repo::list_active(&state.db, &search, p.limit(), p.offset()).await?))
}

#[instrument(skip(state))]
pub async fn get_opportunity(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Envelope<Opportunity>>> {
    let opp = load(&state, id).await?;
    if !visible_to(&opp, auth.as_ref()) {
        return Err(AppError::not_found("Opportunity"));
    }
    Ok(ok(opp))
}

#[instrument(skip(state))]
pub async fn my_opportunities(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(p): ApiQuery<Pagination>,
) -> AppResult<Json<Envelope<Vec<Opportunity>>>> {
    auth.require(POSTERS)?;
    Ok(ok(repo::list_by_recruiter(&state.db, auth.id, p.limit(), p.offset()).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_opportunity(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<CreateOpportunityRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Opportunity>>)> {
    auth.require(POSTERS)?;
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("Title is required"));
    }
    check_deadline(payload.deadline)?;

    let opp = repo::create(
        &state.db,
        NewOpportunity {
            recruiter_id: auth.id,
            title: title.to_string(),
            description: payload.description.trim().to_string(),
            location: non_empty(payload.location),
            required_skills: normalize_skills(payload.required_skills),
            wage: non_empty(payload.wage),
            deadline: payload.deadline,
        },
    )
    .await?;
    info!(opportunity_id = %opp.id, recruiter_id = %auth.id, "opportunity created");
    Ok(created(opp))
}

#[instrument(skip(state, payload))]
pub async fn update_opportunity(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateOpportunityRequest>,
) -> AppResult<Json<Envelope<Opportunity>>> {
    let current = load_owned(&state, &auth, id).await?;
    check_not_moderated(&current, &auth)?;
    if matches!(&payload.title, Some(t) if t.trim().is_empty()) {
        return Err(AppError::bad_request("Title cannot be empty"));
    }
    check_deadline(payload.deadline)?;

    let changes = OpportunityChanges {
        title: payload.title.map(|t| t.trim().to_string()),
        description: payload.description,
        location: payload.location,
        required_skills: payload.required_skills.map(normalize_skills),
        wage: payload.wage,
        deadline: payload.deadline,
    };
    let opp = repo::update(&state.db, id, changes).await?;
    info!(opportunity_id = %id, "opportunity updated");
    Ok(ok(opp))
}

/// Owner-side open/close. Removal is a moderation action.
#[instrument(skip(state, payload))]
pub async fn change_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<StatusActionRequest>,
) -> AppResult<Json<Envelope<Opportunity>>> {
    if payload.action == StatusAction::Remove && !auth.is_admin() {
        return Err(AppError::bad_request("Action must be open or close"));
    }
    let current = load_owned(&state, &auth, id).await?;
    check_not_moderated(&current, &auth)?;
    let opp = if auth.is_admin() {
        repo::set_status(&state.db, id, payload.action.target()).await?
    } else {
        repo::set_status_unless_hidden(&state.db, id, payload.action.target())
            .await?
            .ok_or_else(|| AppError::forbidden("This opportunity was removed by a moderator"))?
    };
    info!(opportunity_id = %id, status = %opp.status, "opportunity status changed");
    Ok(ok(opp))
}

#[instrument(skip(state, payload))]
pub async fn apply(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<ApiJson<ApplyRequest>>,
) -> AppResult<(StatusCode, Json<Envelope<ApplicationDetail>>)> {
    auth.require(&[Role::Farmer])?;
    let opp = load(&state, id).await?;
    if !visible_to(&opp, Some(&auth)) {
        return Err(AppError::not_found("Opportunity"));
    }
    check_can_apply(&opp, OffsetDateTime::now_utc())?;

    let cover_letter = payload.and_then(|ApiJson(p)| non_empty(p.cover_letter));
    let app_id = match repo::insert_application(&state.db, id, auth.id, cover_letter.as_deref()).await {
        Ok(app_id) => app_id,
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            warn!(opportunity_id = %id, worker_id = %auth.id, "duplicate application");
            return Err(AppError::Conflict("You already applied to this opportunity".into()));
        }
        Err(e) => return Err(e.into()),
    };
    let application = repo::get_application(&state.db, app_id)
        .await?
        .ok_or_else(|| AppError::not_found("Application"))?;

    notifications::notify(
        &state.db,
        opp.recruiter_id,
        "application",
        "New application",
        &format!("{} applied to {}", application.worker_name, opp.title),
        Some(&format!("/opportunities/{id}/applications")),
    )
    .await;

    info!(opportunity_id = %id, worker_id = %auth.id, application_id = %app_id, "application submitted");
    Ok(created(application))
}

#[instrument(skip(state))]
pub async fn list_applications(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiQuery(p): ApiQuery<Pagination>,
) -> AppResult<Json<Envelope<Vec<ApplicationDetail>>>> {
    load_owned(&state, &auth, id).await?;
    Ok(ok(repo::list_applications(&state.db, id, p.limit(), p.offset()).await?))
}

#[instrument(skip(state, payload))]
pub async fn decide_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, app_id)): Path<(Uuid, Uuid)>,
    ApiJson(payload): ApiJson<ApplicationStatusRequest>,
) -> AppResult<Json<Envelope<ApplicationDetail>>> {
    let opp = load_owned(&state, &auth, id).await?;
    let current = repo::get_application(&state.db, app_id)
        .await?
        .filter(|a| a.opportunity_id == id)
        .ok_or_else(|| AppError::not_found("Application"))?;
    check_application_transition(current.status, payload.status)?;

    if !repo::decide_application(&state.db, app_id, payload.status).await? {
        return Err(AppError::bad_request("Application was withdrawn"));
    }
    let updated = repo::get_application(&state.db, app_id)
        .await?
        .ok_or_else(|| AppError::not_found("Application"))?;

    notifications::notify(
        &state.db,
        updated.worker_id,
        "application_status",
        "Application update",
        &format!("Your application to {} is now {}", opp.title, payload.status),
        Some(&format!("/opportunities/{id}")),
    )
    .await;

    info!(application_id = %app_id, status = %payload.status, "application decided");
    Ok(ok(updated))
}

#[instrument(skip(state))]
pub async fn my_applications(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(p): ApiQuery<Pagination>,
) -> AppResult<Json<Envelope<Vec<ApplicationDetail>>>> {
    Ok(ok(repo::list_for_worker(&state.db, auth.id, p.limit(), p.offset()).await?))
}

#[instrument(skip(state))]
pub async fn withdraw_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Envelope<ApplicationDetail>>> {
    let application = repo::get_application(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Application"))?;
    if application.worker_id != auth.id {
        return Err(AppError::forbidden("Not your application"));
    }
    if application.status == ApplicationStatus::Withdrawn {
        return Ok(ok(application));
    }
    repo::set_application_status(&state.db, id, ApplicationStatus::Withdrawn).await?;
    let updated = repo::get_application(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Application"))?;
    info!(application_id = %id, "application withdrawn");
    Ok(ok(updated))
}
