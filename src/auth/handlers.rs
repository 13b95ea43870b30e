use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        claims::Role,
        dto::{
            Accepted, AuthResponse, ConfirmCodeRequest, EmailRequest, LoginRequest,
            RefreshRequest, RegisterRequest, ResetPasswordRequest, VerifiedResponse,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{
            hash_password, is_valid_email, normalize_email, verify_dummy, verify_password,
            MIN_PASSWORD_LEN,
        },
    },
    error::{AppError, AppResult},
    farmers,
    otp::{services as otp, OtpPurpose},
    response::{created, ok, ApiJson, Envelope},
    state::AppState,
    users::{
        dto::PublicUser,
        repo::{NewUser, User},
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(get_me))
        .route("/auth/verify/request", post(request_verification))
        .route("/auth/verify/confirm", post(confirm_verification))
        .route("/auth/password/forgot", post(forgot_password))
        .route("/auth/password/reset", post(reset_password))
}

const INVALID_CODE: &str = "Invalid or expired code";

fn auth_response(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    let pair = keys.sign_pair(user.id, user.role).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        AppError::Internal(e)
    })?;
    Ok(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: user.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Envelope<AuthResponse>>)> {
    payload.email = normalize_email(&payload.email);
    let name = payload.name.trim();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::bad_request("Invalid email"));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::bad_request("Password too short"));
    }
    if name.is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }
    if payload.role == Role::Admin {
        warn!(email = %payload.email, "attempt to self-register as admin");
        return Err(AppError::bad_request("Role not allowed"));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;

    let mut tx = state.db.begin().await?;
    let user = User::create(
        &mut *tx,
        NewUser {
            email: &payload.email,
            password_hash: &hash,
            name,
            role: payload.role,
        },
    )
    .await?;
    if user.role == Role::Farmer {
        farmers::repo::create_empty(&mut *tx, user.id).await?;
    }
    tx.commit().await?;

    // Best effort: the user can request another code.
    if let Err(e) = otp::issue(&state, &user.email, OtpPurpose::VerifyEmail).await {
        error!(error = %e, user_id = %user.id, "verification code not sent");
    }

    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    Ok(created(auth_response(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<LoginRequest>,
) -> AppResult<Json<Envelope<AuthResponse>>> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::bad_request("Invalid email"));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            verify_dummy(&payload.password);
            warn!(email = %payload.email, "login unknown email");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    if user.is_suspended() {
        warn!(user_id = %user.id, "login by suspended user");
        return Err(AppError::forbidden("Account suspended"));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(ok(auth_response(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> AppResult<Json<Envelope<AuthResponse>>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    // Reload so role changes and suspensions apply to the new pair.
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    if user.is_suspended() {
        return Err(AppError::forbidden("Account suspended"));
    }

    Ok(ok(auth_response(&state, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Envelope<PublicUser>>> {
    let user = User::find_by_id(&state.db, auth.id).await?.ok_or_else(|| {
        error!(user_id = %auth.id, "user not found");
        AppError::Unauthorized("User not found".into())
    })?;
    Ok(ok(user.into()))
}

/// Always accepted, so the response says nothing about which emails exist.
#[instrument(skip(state, payload))]
pub async fn request_verification(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<EmailRequest>,
) -> AppResult<Json<Envelope<Accepted>>> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("Invalid email"));
    }
    match User::find_by_email(&state.db, &email).await? {
        Some(user) if !user.verified => {
            if let Err(e) = otp::issue(&state, &email, OtpPurpose::VerifyEmail).await {
                error!(error = %e, user_id = %user.id, "verification code not sent");
            }
        }
        _ => info!(%email, "verification not needed; nothing sent"),
    }
    Ok(ok(Accepted { accepted: true }))
}

#[instrument(skip(state, payload))]
pub async fn confirm_verification(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ConfirmCodeRequest>,
) -> AppResult<Json<Envelope<VerifiedResponse>>> {
    let email = normalize_email(&payload.email);
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::bad_request(INVALID_CODE))?;

    if user.verified {
        return Ok(ok(VerifiedResponse {
            verified: true,
            already_verified: true,
        }));
    }

    let secret = state.config.jwt.secret.as_bytes();
    let mut tx = state.db.begin().await?;
    if !otp::consume(&mut *tx, secret, &email, OtpPurpose::VerifyEmail, &payload.code).await? {
        warn!(%email, "verification code rejected");
        return Err(AppError::bad_request(INVALID_CODE));
    }
    let first = User::mark_verified(&mut *tx, &email).await?;
    tx.commit().await?;

    info!(user_id = %user.id, "email verified");
    Ok(ok(VerifiedResponse {
        verified: true,
        already_verified: !first,
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<EmailRequest>,
) -> AppResult<Json<Envelope<Accepted>>> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("Invalid email"));
    }
    if let Some(user) = User::find_by_email(&state.db, &email).await? {
        if let Err(e) = otp::issue(&state, &email, OtpPurpose::PasswordReset).await {
            error!(error = %e, user_id = %user.id, "reset code not sent");
        }
    } else {
        info!(%email, "password reset for unknown email; nothing sent");
    }
    Ok(ok(Accepted { accepted: true }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> AppResult<Json<Envelope<Accepted>>> {
    let email = normalize_email(&payload.email);
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request("Password too short"));
    }
    let hash = hash_password(&payload.new_password)?;

    let secret = state.config.jwt.secret.as_bytes();
    let mut tx = state.db.begin().await?;
    if !otp::consume(&mut *tx, secret, &email, OtpPurpose::PasswordReset, &payload.code).await? {
        warn!(%email, "reset code rejected");
        return Err(AppError::bad_request(INVALID_CODE));
    }
    if !User::set_password(&mut *tx, &email, &hash).await? {
        return Err(AppError::bad_request(INVALID_CODE));
    }
    tx.commit().await?;

    info!(%email, "password reset");
    Ok(ok(Accepted { accepted: true }))
}
