use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    realtime::{self, Channel},
    repo::{self, Conversation, ConversationSummary, Message},
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    notifications,
    response::{created, ok, ApiForm, ApiJson, ApiQuery, Envelope, Pagination},
    state::AppState,
    users::repo::User,
};

const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub participant_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ChannelAuthRequest {
    pub socket_id: String,
    pub channel_name: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelAuth {
    pub auth: String,
}

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/chat/conversations", get(list_conversations).post(start_conversation))
        .route(
            "/chat/conversations/:id/messages",
            get(list_messages).post(send_message),
        )
        .route("/chat/auth", post(authorize_channel))
}

async fn load_participating(state: &AppState, auth: &AuthUser, id: Uuid) -> AppResult<Conversation> {
    let conv = repo::get(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Conversation"))?;
    if !conv.includes(auth.id) {
        return Err(AppError::forbidden("Not a participant in this conversation"));
    }
    Ok(conv)
}

#[instrument(skip(state, payload))]
pub async fn start_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<StartConversationRequest>,
) -> AppResult<Json<Envelope<Conversation>>> {
    if payload.participant_id == auth.id {
        return Err(AppError::bad_request("You cannot start a conversation with yourself"));
    }
    if !User::exists_active(&state.db, payload.participant_id).await? {
        return Err(AppError::not_found("User"));
    }
    let conv = repo::get_or_create(&state.db, auth.id, payload.participant_id).await?;
    debug!(conversation_id = %conv.id, "conversation ready");
    Ok(ok(conv))
}

#[instrument(skip(state))]
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(p): ApiQuery<Pagination>,
) -> AppResult<Json<Envelope<Vec<ConversationSummary>>>> {
    Ok(ok(repo::list_for(&state.db, auth.id, p.limit(), p.offset()).await?))
}

#[instrument(skip(state))]
pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiQuery(p): ApiQuery<Pagination>,
) -> AppResult<Json<Envelope<Vec<Message>>>> {
    load_participating(&state, &auth, id).await?;
    Ok(ok(repo::list_messages(&state.db, id, p.limit(), p.offset()).await?))
}

#[instrument(skip(state, payload))]
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Message>>)> {
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(AppError::bad_request("Message cannot be empty"));
    }
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::bad_request("Message is too long"));
    }
    let conv = load_participating(&state, &auth, id).await?;
    let message = repo::insert_message(&state.db, id, auth.id, body).await?;

    notifications::notify(
        &state.db,
        conv.peer_of(auth.id),
        "message",
        "New message",
        &preview(body),
        Some(&format!("/chat/{id}")),
    )
    .await;

    info!(conversation_id = %id, message_id = %message.id, "message sent");
    Ok(created(message))
}

fn preview(body: &str) -> String {
    const LEN: usize = 80;
    if body.chars().count() <= LEN {
        return body.to_string();
    }
    let cut: String = body.chars().take(LEN).collect();
    format!("{cut}…")
}

#[instrument(skip(state, form))]
pub async fn authorize_channel(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiForm(form): ApiForm<ChannelAuthRequest>,
) -> AppResult<Json<ChannelAuth>> {
    let rt = &state.config.realtime;
    let (Some(key), Some(secret)) = (rt.app_key.as_deref(), rt.app_secret.as_deref()) else {
        return Err(AppError::Unavailable("Realtime is not configured".into()));
    };
    if !realtime::valid_socket_id(&form.socket_id) {
        return Err(AppError::bad_request("Invalid socket_id"));
    }

    let allowed = match Channel::parse(&form.channel_name) {
        Some(Channel::User(id)) => id == auth.id,
        Some(Channel::Chat(id)) => repo::get(&state.db, id)
            .await?
            .is_some_and(|c| c.includes(auth.id)),
        None => false,
    };
    if !allowed {
        warn!(user_id = %auth.id, "channel authorization refused");
        return Err(AppError::forbidden("Not allowed on this channel"));
    }

    let auth = realtime::sign(key, secret, &form.socket_id, &form.channel_name)?;
    Ok(Json(ChannelAuth { auth }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::build_app, auth::{claims::Role, jwt::JwtKeys}};
    use axum::{body::Body, extract::FromRef, http::Request};
    use tower::ServiceExt;

    fn channel_auth_request(token: &str, socket: &str, channel: &str) -> Request<Body> {
        Request::post("/api/chat/auth")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(format!("socket_id={socket}&channel_name={channel}")))
            .unwrap()
    }

    #[tokio::test]
    async fn own_user_channel_is_signed() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let t = JwtKeys::from_ref(&state).sign_access(me, Role::Farmer).unwrap();
        let channel = Channel::User(me).to_string();
        let res = build_app(state)
            .oneshot(channel_auth_request(&t, "123.456", &channel))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let expected = realtime::sign("test-key", "test-secret", "123.456", &channel).unwrap();
        assert_eq!(json["auth"], expected);
    }

    #[tokio::test]
    async fn other_user_channel_is_forbidden() {
        let state = AppState::fake();
        let t = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4(), Role::Buyer).unwrap();
        let res = build_app(state)
            .oneshot(channel_auth_request(&t, "123.456", &Channel::User(Uuid::new_v4()).to_string()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn cannot_chat_with_self() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let t = JwtKeys::from_ref(&state).sign_access(me, Role::Buyer).unwrap();
        let res = build_app(state)
            .oneshot(
                Request::post("/api/chat/conversations")
                    .header("authorization", format!("Bearer {t}"))
                    .header("content-type", "application/json")
                    .body(Body::from(format!(r#"{{"participant_id":"{me}"}}"#)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn previews_are_truncated() {
        assert_eq!(preview("hello"), "hello");
        let long = "a".repeat(200);
        assert_eq!(preview(&long).chars().count(), 81);
    }
}
