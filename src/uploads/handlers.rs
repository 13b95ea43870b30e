use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    repo::{self, Upload, UploadKind},
    services::{self, MAX_UPLOAD_BYTES},
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    response::{created, ok, ApiQuery, Envelope, Pagination},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct UploadView {
    #[serde(flatten)]
    pub upload: Upload,
    pub signed_url: String,
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/uploads", get(list_uploads).post(upload))
        .route("/uploads/:id", delete(delete_upload))
        // multipart framing on top of the file itself
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
}

/// POST /uploads (multipart)
/// Fields: `file` (required), `kind` = image | document (optional).
#[instrument(skip(state, mp))]
pub async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    mut mp: Multipart,
) -> AppResult<(StatusCode, Json<Envelope<Upload>>)> {
    let mut file = None;
    let mut kind = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request(e.body_text()))?;
                file = Some((data, content_type));
            }
            Some("kind") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(e.body_text()))?;
                let parsed = text
                    .trim()
                    .parse::<UploadKind>()
                    .map_err(|e| AppError::bad_request(e.to_string()))?;
                kind = Some(parsed);
            }
            _ => {}
        }
    }
    let Some((body, content_type)) = file else {
        return Err(AppError::bad_request("file is required"));
    };

    let upload = services::store(&state, auth.id, body, &content_type, kind).await?;
    info!(upload_id = %upload.id, user_id = %auth.id, size = upload.size_bytes, "file uploaded");
    Ok(created(upload))
}

#[instrument(skip(state))]
pub async fn list_uploads(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(p): ApiQuery<Pagination>,
) -> AppResult<Json<Envelope<Vec<UploadView>>>> {
    let uploads = repo::list_for(&state.db, auth.id, p.limit(), p.offset()).await?;
    let mut out = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let signed_url = services::presign(&state, &upload.key).await?;
        out.push(UploadView { upload, signed_url });
    }
    Ok(ok(out))
}

#[instrument(skip(state))]
pub async fn delete_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let upload = repo::get(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Upload"))?;
    if upload.user_id != auth.id {
        return Err(AppError::forbidden("Not your upload"));
    }
    state.storage.delete_object(&upload.key).await.map_err(|e| {
        warn!(error = %e, key = %upload.key, "object delete failed");
        AppError::Internal(e)
    })?;
    repo::delete(&state.db, id).await?;
    info!(upload_id = %id, "upload deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::build_app, auth::{claims::Role, jwt::JwtKeys}};
    use axum::{body::Body, extract::FromRef, http::Request};
    use tower::ServiceExt;

    fn multipart(parts: &[(&str, &str, &[u8])]) -> (String, Vec<u8>) {
        let boundary = "XBOUNDARYX";
        let mut body = Vec::new();
        for (name, ct, data) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"f\"\r\n").as_bytes(),
            );
            body.extend_from_slice(format!("Content-Type: {ct}\r\n\r\n").as_bytes());
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }

    #[tokio::test]
    async fn missing_file_field_is_400() {
        let state = AppState::fake();
        let t = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4(), Role::Farmer).unwrap();
        let (ct, body) = multipart(&[("other", "text/plain", &b"hi"[..])]);
        let res = build_app(state)
            .oneshot(
                Request::post("/api/uploads")
                    .header("authorization", format!("Bearer {t}"))
                    .header("content-type", ct)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsupported_type_is_400() {
        let state = AppState::fake();
        let t = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4(), Role::Farmer).unwrap();
        let (ct, body) = multipart(&[("file", "text/plain", &b"not an image"[..])]);
        let res = build_app(state)
            .oneshot(
                Request::post("/api/uploads")
                    .header("authorization", format!("Bearer {t}"))
                    .header("content-type", ct)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    mod with_db {
        use super::*;
        use crate::{storage::StorageClient, testing::seed_user};
        use axum::async_trait;
        use bytes::Bytes;
        use sqlx::PgPool;
        use std::sync::{Arc, Mutex};

        #[derive(Default)]
        struct RecordingStorage {
            stored: Mutex<Vec<String>>,
            deleted: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl StorageClient for RecordingStorage {
            async fn put_object(&self, key: &str, _body: Bytes, _ct: &str) -> anyhow::Result<()> {
                self.stored.lock().unwrap().push(key.to_string());
                Ok(())
            }
            async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
                self.deleted.lock().unwrap().push(key.to_string());
                Ok(())
            }
            async fn presign_get(&self, key: &str, _seconds: u64) -> anyhow::Result<String> {
                Ok(format!("https://store.test/{key}?sig"))
            }
            fn public_url(&self, key: &str) -> String {
                format!("https://store.test/{key}")
            }
        }

        async fn post_png(state: AppState, user: Uuid) -> StatusCode {
            let t = JwtKeys::from_ref(&state).sign_access(user, Role::Farmer).unwrap();
            let (ct, body) = multipart(&[("file", "image/png", &b"\x89PNG fake"[..])]);
            build_app(state)
                .oneshot(
                    Request::post("/api/uploads")
                        .header("authorization", format!("Bearer {t}"))
                        .header("content-type", ct)
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap()
                .status()
        }

        #[sqlx::test]
        async fn stored_upload_is_recorded(db: PgPool) {
            let user = seed_user(&db, Role::Farmer).await;
            let storage = Arc::new(RecordingStorage::default());
            let mut state = AppState::fake_with_db(db.clone());
            state.storage = storage.clone();

            assert_eq!(post_png(state, user).await, StatusCode::CREATED);
            assert_eq!(storage.stored.lock().unwrap().len(), 1);
            assert!(storage.deleted.lock().unwrap().is_empty());
            assert_eq!(repo::list_for(&db, user, 20, 0).await.unwrap().len(), 1);
        }

        #[sqlx::test]
        async fn failed_insert_removes_the_stored_object(db: PgPool) {
            // No such user: the row insert fails on the foreign key.
            let ghost = Uuid::new_v4();
            let storage = Arc::new(RecordingStorage::default());
            let mut state = AppState::fake_with_db(db.clone());
            state.storage = storage.clone();

            assert_eq!(post_png(state, ghost).await, StatusCode::BAD_REQUEST);
            let stored = storage.stored.lock().unwrap().clone();
            assert_eq!(stored.len(), 1);
            assert!(stored[0].starts_with(&format!("uploads/{ghost}/")));
            assert_eq!(*storage.deleted.lock().unwrap(), stored);
        }
    }
}
