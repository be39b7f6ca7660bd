use std::sync::Arc;

use chauffeur_dispatch::auth::StaticTokens;
use chauffeur_dispatch::config::{Config, LogFormat};
use chauffeur_dispatch::error::AppError;
use chauffeur_dispatch::{api, state};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let identity = Arc::new(StaticTokens::new(config.auth_tokens.clone()));
    tracing::info!(tokens = config.auth_tokens.len(), "identity provider seeded");

    let app_state = state::AppState::new(config.event_buffer_size, identity);
    if config.seed_demo_drivers {
        let drivers = app_state.seed_demo_drivers();
        tracing::info!(count = drivers.len(), "demo drivers onboarded");
    }
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state, &config.static_dir);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
