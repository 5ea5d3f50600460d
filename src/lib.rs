pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod models;
pub mod pipeline;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::api::types::{generate_token, TokenRegistry};
use crate::api::ServerError;
use crate::config::{AppConfig, ConfigError, TokenGrant};
use crate::core_state::{CoreError, CoreState};
use crate::models::{OwnerId, UnauthorizedError};

/// Owner used for the generated token when none are configured.
const LOCAL_OWNER: &str = "local";

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Invalid owner: {0}")]
    Owner(#[from] UnauthorizedError),

    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Start the service and run until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let mut config = AppConfig::from_env()?;
    if config.api_tokens.is_empty() {
        let token = generate_token();
        config
            .api_tokens
            .push(TokenGrant::new(&token, OwnerId::parse(LOCAL_OWNER)?));
        tracing::warn!(
            owner = LOCAL_OWNER,
            "LETTERA_API_TOKENS not set; generated a token for this run"
        );
        println!("API token for owner '{LOCAL_OWNER}': {token}");
    }

    let tokens = TokenRegistry::from_grants(&config.api_tokens);
    tracing::info!(owners = tokens.len(), "API tokens loaded");

    let bind_addr = config.bind_addr;
    let core = Arc::new(CoreState::from_config(config)?);
    let server = api::start_api_server(core, tokens, bind_addr).await?;
    tracing::info!(addr = %server.addr(), "{} ready", config::APP_NAME);

    tokio::signal::ctrl_c().await.map_err(StartupError::Signal)?;
    server.shutdown().await?;
    Ok(())
}
