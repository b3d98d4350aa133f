//! Application connector binary.
//!
//! Serves the onboarding handshake over HTTP so an operator can walk it step
//! by step.

mod api;

use api::{AppState, create_router};
use kyma_handshake::config::Config;
use kyma_handshake::session::SessionRegistry;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Without an assets directory there is nowhere to keep certificates.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        assets_dir = %config.assets_dir.display(),
        listen_addr = %config.listen_addr,
        verify_hostname = config.verify_hostname,
        "starting application connector"
    );

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.listen_addr, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    let state = Arc::new(AppState {
        sessions: SessionRegistry::new(config),
    });
    let app = create_router(state);

    info!(addr = ?listener.local_addr().ok(), "listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
