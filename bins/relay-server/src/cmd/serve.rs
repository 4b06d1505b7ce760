use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{ServeArgs, ServerConfig};
use crate::error::ServerError;
use relay_engine::Relay;

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("relay-server starting");

    // --- Load config ---
    let config = ServerConfig::load(&args.config)?;
    tracing::info!(config = %args.config, api_port = config.api_port, "loaded config");

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- Relay core: state создаётся здесь, один на процесс ---
    let relay = Arc::new(Relay::new());

    // --- API server ---
    let api_relay = relay.clone();
    let api_port = config.api_port;
    let api_token = token.clone();
    let mut api_handle = tokio::spawn(async move {
        relay_api_server::run(api_port, api_relay, api_token).await
    });

    tracing::info!(port = config.api_port, "api server listening");
    tracing::info!("server ready");

    // --- Ожидание Ctrl+C или падения api-задачи ---
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("shutting down...");
            token.cancel();
        }
        joined = &mut api_handle => {
            return match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ServerError::Api(e)),
                Err(e) => Err(ServerError::Api(format!("api task: {e}"))),
            };
        }
    }

    // Drain: дождаться graceful выхода api server'а
    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "api server error during shutdown"),
        Err(e) => tracing::error!(error = %e, "api task join error"),
    }

    tracing::info!("shutdown complete");
    Ok(())
}
