use std::time::Duration;

mod admin;
mod app;
mod auth;
mod chat;
mod community;
mod config;
mod enums;
mod error;
mod farmers;
mod mail;
mod marketplace;
mod notifications;
mod opportunities;
mod otp;
mod response;
mod state;
mod storage;
#[cfg(test)]
mod testing;
mod translation;
mod uploads;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "agrireach=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    sqlx::migrate!("./migrations").run(&app_state.db).await?;

    otp::services::spawn_purge_task(app_state.db.clone(), Duration::from_secs(10 * 60));

    app::serve(app::build_app(app_state)).await
}
