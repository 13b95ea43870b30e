use anyhow::Context;
use axum::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::{
    auth::extractors::AuthUser,
    config::TranslateConfig,
    error::{AppError, AppResult},
    response::{ok, ApiJson, Envelope},
    state::AppState,
};

pub const MAX_TEXT_CHARS: usize = 5000;

#[async_trait]
pub trait Translator: Send + Sync {
    /// `source` of `None` asks the backend to detect the language.
    async fn translate(&self, text: &str, source: Option<&str>, target: &str) -> anyhow::Result<String>;
}

/// Client for a LibreTranslate-compatible `POST /translate` endpoint.
pub struct HttpTranslator {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct TranslateBody<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateReply {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl HttpTranslator {
    pub fn new(api_url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("build translate http client")?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, source: Option<&str>, target: &str) -> anyhow::Result<String> {
        let reply: TranslateReply = self
            .client
            .post(&self.api_url)
            .json(&TranslateBody {
                q: text,
                source: source.unwrap_or("auto"),
                target,
                format: "text",
                api_key: self.api_key.as_deref(),
            })
            .send()
            .await
            .context("translate request")?
            .error_for_status()
            .context("translate status")?
            .json()
            .await
            .context("translate response body")?;
        Ok(reply.translated_text)
    }
}

pub fn from_config(cfg: &TranslateConfig) -> anyhow::Result<Option<std::sync::Arc<dyn Translator>>> {
    match &cfg.api_url {
        Some(url) => Ok(Some(std::sync::Arc::new(HttpTranslator::new(url, cfg.api_key.clone())?))),
        None => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    pub target: String,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub translated_text: String,
    pub source: Option<String>,
    pub target: String,
}

fn is_language_code(code: &str) -> bool {
    (2..=5).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic() || c == '-')
}

fn validate(req: &TranslateRequest) -> AppResult<()> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("Text is required"));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(AppError::bad_request(format!(
            "Text exceeds {MAX_TEXT_CHARS} characters"
        )));
    }
    if !is_language_code(&req.target) {
        return Err(AppError::bad_request("Invalid target language"));
    }
    if let Some(src) = &req.source {
        if !is_language_code(src) {
            return Err(AppError::bad_request("Invalid source language"));
        }
    }
    Ok(())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/translate", post(translate))
}

#[instrument(skip(state, payload))]
pub async fn translate(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiJson(payload): ApiJson<TranslateRequest>,
) -> AppResult<Json<Envelope<TranslateResponse>>> {
    validate(&payload)?;
    let translator = state
        .translator
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("Translation is not configured".into()))?;

    let target = payload.target.to_lowercase();
    let source = payload.source.map(|s| s.to_lowercase());
    let translated_text = translator
        .translate(payload.text.trim(), source.as_deref(), &target)
        .await
        .map_err(|e| {
            warn!(error = %e, "translation backend failed");
            AppError::Internal(e)
        })?;

    Ok(ok(TranslateResponse {
        translated_text,
        source,
        target,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(text: &str, target: &str, source: Option<&str>) -> TranslateRequest {
        TranslateRequest {
            text: text.into(),
            target: target.into(),
            source: source.map(Into::into),
        }
    }

    #[test]
    fn validation_rules() {
        assert!(validate(&req("Hello farmers", "fr", None)).is_ok());
        assert!(validate(&req("Hello", "pt-BR", Some("en"))).is_ok());
        assert!(validate(&req("   ", "fr", None)).is_err());
        assert!(validate(&req("Hello", "f", None)).is_err());
        assert!(validate(&req("Hello", "fr", Some("e1"))).is_err());
        let long = "a".repeat(MAX_TEXT_CHARS + 1);
        assert!(validate(&req(&long, "fr", None)).is_err());
    }

    #[test]
    fn request_body_uses_auto_detection() {
        let body = serde_json::to_value(TranslateBody {
            q: "hola",
            source: "auto",
            target: "en",
            format: "text",
            api_key: None,
        })
        .unwrap();
        assert_eq!(body["source"], "auto");
        assert!(body.get("api_key").is_none());
    }
}
