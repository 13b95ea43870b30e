//! Helpers for tests that run against a migrated database (`#[sqlx::test]`).

use axum::{
    body::Body,
    extract::FromRef,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    auth::{claims::Role, jwt::JwtKeys, password::DUMMY_HASH},
    state::AppState,
};

/// Inserts an active, verified user and returns its id. The stored password
/// hash matches no password.
pub async fn seed_user(db: &PgPool, role: Role) -> Uuid {
    seed_user_with(db, role, &format!("{}@test.local", Uuid::new_v4().simple()), true).await
}

pub async fn seed_user_with(db: &PgPool, role: Role, email: &str, verified: bool) -> Uuid {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO users (email, password_hash, name, role, verified)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(DUMMY_HASH)
    .bind(format!("Test {role}"))
    .bind(role.as_str())
    .bind(verified)
    .fetch_one(db)
    .await
    .unwrap();
    if role == Role::Farmer {
        sqlx::query("INSERT INTO farmers (user_id) VALUES ($1)")
            .bind(id)
            .execute(db)
            .await
            .unwrap();
    }
    id
}

pub fn bearer(state: &AppState, id: Uuid, role: Role) -> String {
    let token = JwtKeys::from_ref(state).sign_access(id, role).unwrap();
    format!("Bearer {token}")
}

/// Sends one request and returns the status with the decoded JSON body
/// (`Null` for empty bodies).
pub async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        req = req.header("authorization", auth);
    }
    let req = match body {
        Some(json) => req
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
