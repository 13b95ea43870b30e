use anyhow::Context;
use axum::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::MailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Development mailer: messages only go to the log.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(%to, %subject, %body, "mail (log only)");
        Ok(())
    }
}

#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Delivers through an HTTP email API that accepts a JSON message.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: &str, api_key: Option<String>, from: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build mail http client")?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key,
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let mut req = self.client.post(&self.api_url).json(&OutgoingMail {
            from: &self.from,
            to,
            subject,
            text: body,
        });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req.send()
            .await
            .context("mail api request")?
            .error_for_status()
            .context("mail api status")?;
        info!(%to, %subject, "mail sent");
        Ok(())
    }
}

/// Picks the HTTP mailer when an API URL is configured.
pub fn from_config(cfg: &MailConfig) -> anyhow::Result<std::sync::Arc<dyn Mailer>> {
    Ok(match &cfg.api_url {
        Some(url) => std::sync::Arc::new(HttpMailer::new(url, cfg.api_key.clone(), &cfg.from)?),
        None => std::sync::Arc::new(LogMailer),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        LogMailer.send("a@b.co", "hi", "body").await.unwrap();
    }

    #[test]
    fn config_without_url_uses_log_mailer() {
        let cfg = MailConfig {
            api_url: None,
            api_key: None,
            from: "no-reply@agrireach.local".into(),
        };
        assert!(from_config(&cfg).is_ok());
    }

    #[test]
    fn outgoing_mail_json() {
        let json = serde_json::to_value(OutgoingMail {
            from: "f@x.io",
            to: "t@x.io",
            subject: "s",
            text: "b",
        })
        .unwrap();
        assert_eq!(json["to"], "t@x.io");
        assert_eq!(json["text"], "b");
    }
}
