use std::net::SocketAddr;

use nexusflow::{app, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "nexusflow=debug,axum=info,tower_http=info".to_string());
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

    // Missing secret or database URL stops us here, before any listener exists.
    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
        e
    })?;

    let state = AppState::init(&config).await?;
    let router = app::build_app(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    app::serve(router, addr, state).await
}
