use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// When unset, mail is only logged.
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub otp_ttl_minutes: i64,
    pub storage: StorageConfig,
    pub mail: MailConfig,
    pub realtime: RealtimeConfig,
    pub translate: TranslateConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "agrireach".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "agrireach-users".into()),
            ttl_minutes: env_i64("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_i64("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("STORAGE_ENDPOINT").unwrap_or_default(),
            bucket: std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "agrireach".into()),
            access_key: std::env::var("STORAGE_ACCESS_KEY").unwrap_or_default(),
            secret_key: std::env::var("STORAGE_SECRET_KEY").unwrap_or_default(),
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        let mail = MailConfig {
            api_url: env_opt("MAIL_API_URL"),
            api_key: env_opt("MAIL_API_KEY"),
            from: std::env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@agrireach.local".into()),
        };
        let realtime = RealtimeConfig {
            app_key: env_opt("REALTIME_APP_KEY"),
            app_secret: env_opt("REALTIME_APP_SECRET"),
        };
        let translate = TranslateConfig {
            api_url: env_opt("TRANSLATE_API_URL"),
            api_key: env_opt("TRANSLATE_API_KEY"),
        };
        Ok(Self {
            database_url,
            jwt,
            otp_ttl_minutes: env_i64("OTP_TTL_MINUTES", 10),
            storage,
            mail,
            realtime,
            translate,
        })
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
