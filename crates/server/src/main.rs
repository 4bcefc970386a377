use anyhow::{self, Error as AnyhowError};
use prep::{PrepConfig, PrepError};
use server::{AppState, ServerConfig, routes};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Debug, Error)]
pub enum MeetingPrepError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] PrepError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), MeetingPrepError> {
    // Load environment variables from `.env` if present so local development picks up API keys
    dotenv::dotenv().ok();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!("warn,server={level},prep={level}", level = log_level);
    let env_filter = EnvFilter::try_new(filter_string)
        .map_err(|e| anyhow::anyhow!("Failed to create tracing filter: {}", e))?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let prep_config = PrepConfig::from_env()?;
    let server_config = ServerConfig::from_env();

    tracing::info!(
        "Models: calendar={}/{}, extraction={}/{}, research={}/{}, formatter={}/{}",
        prep_config.calendar_model.provider,
        prep_config.calendar_model.model,
        prep_config.extraction_model.provider,
        prep_config.extraction_model.model,
        prep_config.research_model.provider,
        prep_config.research_model.model,
        prep_config.formatter_model.provider,
        prep_config.formatter_model.model
    );
    if prep_config.tavily.api_key.is_none() {
        tracing::warn!("TAVILY_API_KEY not set - research searches will fail");
    }

    let app_router = routes::router(
        AppState::from_config(&prep_config),
        &server_config.cors_allowed_origins,
    );

    let host = &server_config.host;
    let port = server_config.port;
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();

    tracing::info!("Server running on http://{host}:{actual_port}");

    axum::serve(listener, app_router).await?;
    Ok(())
}
