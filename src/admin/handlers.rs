use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo::{self as admin_repo, Stats};
use crate::{
    auth::{claims::Role, extractors::AdminUser},
    community::repo::{self as community_repo, ContentStatus},
    enums::text_enum,
    error::{AppError, AppResult},
    marketplace::repo::{self as market_repo, ProductStatus},
    opportunities::{
        repo::{self as opp_repo, Opportunity},
        services::StatusAction,
    },
    response::{ok, ApiJson, ApiQuery, Envelope, Pagination},
    state::AppState,
    users::repo::{User, UserStatus},
};

text_enum! {
    pub enum UserAction {
        Suspend => "suspend",
        Activate => "activate",
        Verify => "verify",
    }
}

text_enum! {
    pub enum ThreadAction {
        Pin => "pin",
        Unpin => "unpin",
        Hide => "hide",
        Restore => "restore",
    }
}

text_enum! {
    pub enum ProductAction {
        Hide => "hide",
        Restore => "restore",
    }
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest<A> {
    pub action: A,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Serialize)]
pub struct Moderated {
    pub id: Uuid,
    pub action: String,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id", put(moderate_user))
        .route("/admin/opportunities/:id", put(moderate_opportunity))
        .route("/admin/threads/:id", put(moderate_thread))
        .route("/admin/products/:id", put(moderate_product))
}

#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Envelope<Stats>>> {
    Ok(ok(admin_repo::stats(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(p): ApiQuery<Pagination>,
    ApiQuery(f): ApiQuery<UserFilter>,
) -> AppResult<Json<Envelope<Vec<User>>>> {
    Ok(ok(User::list(&state.db, f.role, f.status, p.limit(), p.offset()).await?))
}

#[instrument(skip(state, payload))]
pub async fn moderate_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<ActionRequest<UserAction>>,
) -> AppResult<Json<Envelope<User>>> {
    let user = match payload.action {
        UserAction::Suspend if id == admin.id => {
            return Err(AppError::bad_request("You cannot suspend yourself"));
        }
        UserAction::Suspend => User::set_status(&state.db, id, UserStatus::Suspended).await?,
        UserAction::Activate => User::set_status(&state.db, id, UserStatus::Active).await?,
        UserAction::Verify => User::set_verified(&state.db, id).await?,
    };
    info!(user_id = %id, action = %payload.action, by = %admin.id, "user moderated");
    Ok(ok(user))
}

#[instrument(skip(state, payload))]
pub async fn moderate_opportunity(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<ActionRequest<StatusAction>>,
) -> AppResult<Json<Envelope<Opportunity>>> {
    let opp = opp_repo::set_status(&state.db, id, payload.action.target()).await?;
    info!(opportunity_id = %id, status = %opp.status, by = %admin.id, "opportunity moderated");
    Ok(ok(opp))
}

#[instrument(skip(state, payload))]
pub async fn moderate_thread(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<ActionRequest<ThreadAction>>,
) -> AppResult<Json<Envelope<Moderated>>> {
    let touched = match payload.action {
        ThreadAction::Pin => community_repo::set_pinned(&state.db, id, true).await?,
        ThreadAction::Unpin => community_repo::set_pinned(&state.db, id, false).await?,
        ThreadAction::Hide => community_repo::set_status(&state.db, id, ContentStatus::Hidden).await?,
        ThreadAction::Restore => community_repo::set_status(&state.db, id, ContentStatus::Visible).await?,
    };
    if touched == 0 {
        return Err(AppError::not_found("Thread"));
    }
    info!(thread_id = %id, action = %payload.action, by = %admin.id, "thread moderated");
    Ok(ok(Moderated {
        id,
        action: payload.action.to_string(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn moderate_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<ActionRequest<ProductAction>>,
) -> AppResult<Json<Envelope<Moderated>>> {
    let status = match payload.action {
        ProductAction::Hide => ProductStatus::Hidden,
        ProductAction::Restore => ProductStatus::Active,
    };
    if market_repo::set_status(&state.db, id, status).await? == 0 {
        return Err(AppError::not_found("Product"));
    }
    info!(product_id = %id, action = %payload.action, by = %admin.id, "product moderated");
    Ok(ok(Moderated {
        id,
        action: payload.action.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::build_app, auth::jwt::JwtKeys};
    use axum::{body::Body, extract::FromRef, http::{Request, StatusCode}};
    use tower::ServiceExt;

    #[tokio::test]
    async fn non_admins_get_403() {
        let state = AppState::fake();
        let t = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4(), Role::Recruiter).unwrap();
        let res = build_app(state)
            .oneshot(
                Request::get("/api/admin/stats")
                    .header("authorization", format!("Bearer {t}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_cannot_suspend_self() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let t = JwtKeys::from_ref(&state).sign_access(me, Role::Admin).unwrap();
        let res = build_app(state)
            .oneshot(
                Request::put(format!("/api/admin/users/{me}"))
                    .header("authorization", format!("Bearer {t}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"action":"suspend"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_action_is_400() {
        let state = AppState::fake();
        let t = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4(), Role::Admin).unwrap();
        let res = build_app(state)
            .oneshot(
                Request::put(format!("/api/admin/products/{}", Uuid::new_v4()))
                    .header("authorization", format!("Bearer {t}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"action":"delete"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    mod with_db {
        use super::*;
        use crate::{
            opportunities::{repo::NewOpportunity, services::OpportunityStatus},
            testing::{bearer, call, seed_user},
        };
        use axum::http::Method;
        use serde_json::json;
        use sqlx::PgPool;

        #[sqlx::test]
        async fn closing_an_opportunity_returns_the_updated_document(db: PgPool) {
            let recruiter = seed_user(&db, Role::Recruiter).await;
            let admin = seed_user(&db, Role::Admin).await;
            let opp = opp_repo::create(
                &db,
                NewOpportunity {
                    recruiter_id: recruiter,
                    title: "Greenhouse pickers".into(),
                    description: String::new(),
                    location: None,
                    required_skills: vec!["picking".into()],
                    wage: Some("KES 900/day".into()),
                    deadline: None,
                },
            )
            .await
            .unwrap();
            let state = AppState::fake_with_db(db.clone());
            let auth = bearer(&state, admin, Role::Admin);
            let app = build_app(state);

            let (status, body) = call(
                &app,
                Method::PUT,
                &format!("/api/admin/opportunities/{}", opp.id),
                Some(&auth),
                Some(json!({ "action": "close" })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["ok"], true);
            assert_eq!(body["data"]["id"], opp.id.to_string());
            assert_eq!(body["data"]["status"], "closed");
            assert_eq!(body["data"]["title"], "Greenhouse pickers");
            assert_eq!(body["data"]["recruiter_id"], recruiter.to_string());

            let stored = opp_repo::get(&db, opp.id).await.unwrap().unwrap();
            assert_eq!(stored.status, OpportunityStatus::Closed);
        }

        #[sqlx::test]
        async fn moderating_a_missing_opportunity_is_404(db: PgPool) {
            let admin = seed_user(&db, Role::Admin).await;
            let state = AppState::fake_with_db(db.clone());
            let auth = bearer(&state, admin, Role::Admin);
            let (status, body) = call(
                &build_app(state),
                Method::PUT,
                &format!("/api/admin/opportunities/{}", Uuid::new_v4()),
                Some(&auth),
                Some(json!({ "action": "close" })),
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert!(body["error"].is_string());
        }
    }
}
