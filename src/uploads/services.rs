use anyhow::Context;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use super::repo::{self, NewUpload, Upload, UploadKind};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const PRESIGN_TTL_SECS: u64 = 30 * 60;

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}

/// Validates the declared kind against the content type and picks the extension.
pub fn classify(content_type: &str, requested: Option<UploadKind>) -> AppResult<(UploadKind, &'static str)> {
    let ext = ext_from_mime(content_type)
        .ok_or_else(|| AppError::bad_request(format!("Unsupported content type {content_type}")))?;
    let actual = if ext == "pdf" {
        UploadKind::Document
    } else {
        UploadKind::Image
    };
    match requested {
        Some(k) if k != actual => Err(AppError::bad_request(format!(
            "{content_type} is not a valid {k}"
        ))),
        _ => Ok((actual, ext)),
    }
}

pub fn object_key(user_id: Uuid, id: Uuid, ext: &str) -> String {
    format!("uploads/{user_id}/{id}.{ext}")
}

pub async fn store(
    st: &AppState,
    user_id: Uuid,
    body: Bytes,
    content_type: &str,
    kind: Option<UploadKind>,
) -> AppResult<Upload> {
    if body.is_empty() {
        return Err(AppError::bad_request("File is empty"));
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::bad_request("File exceeds 10 MiB"));
    }
    let (kind, ext) = classify(content_type, kind)?;

    let id = Uuid::new_v4();
    let key = object_key(user_id, id, ext);
    let size_bytes = body.len() as i64;
    st.storage
        .put_object(&key, body, content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;

    let url = st.storage.public_url(&key);
    let inserted = repo::insert(
        &st.db,
        NewUpload {
            id,
            user_id,
            key: &key,
            url: &url,
            kind,
            content_type,
            size_bytes,
        },
    )
    .await;
    match inserted {
        Ok(upload) => Ok(upload),
        Err(e) => {
            if let Err(del) = st.storage.delete_object(&key).await {
                warn!(error = %del, %key, "orphaned object not removed");
            }
            Err(e.into())
        }
    }
}

pub async fn presign(st: &AppState, key: &str) -> anyhow::Result<String> {
    st.storage
        .presign_get(key, PRESIGN_TTL_SECS)
        .await
        .with_context(|| format!("presign url for {key}"))
}
