//! signalhub server.
//!
//! - `GET /` greeting, `GET /chathub` WebSocket hub endpoint
//! - Config from `signalhub.yaml` when present, defaults otherwise
//! - Graceful shutdown on Ctrl-C / SIGTERM closes every hub connection

use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use signalhub_core::error::{HubError, Result};
use signalhub_gateway::{app_state::AppState, config, router};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cfg = config::load_or_default(config::DEFAULT_CONFIG_PATH)?;
    let listen: SocketAddr = cfg.server.listen.parse().map_err(|e| {
        HubError::BadRequest(format!("server.listen must be a valid SocketAddr: {e}"))
    })?;
    let hub_path = cfg.server.hub_path.clone();

    let state = AppState::new(cfg)?;
    let app = router::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| HubError::Internal(format!("failed to bind {listen}: {e}")))?;
    tracing::info!(%listen, %hub_path, "signalhub starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .map_err(|e| HubError::Internal(format!("server failed: {e}")))?;

    tracing::info!("signalhub stopped");
    Ok(())
}

async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, draining hub connections");
    state.begin_drain();
}
