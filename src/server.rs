//! Server startup and shutdown.
//!
//! `run_server` registers services, assembles the pipeline, binds the
//! listener and serves until a shutdown signal arrives.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::startup::Startup;
use tokio::net::TcpListener;
use tracing::info;

/// Run the web server with the given configuration.
///
/// # Errors
///
/// This function will return an error if:
/// - Service registration or pipeline assembly fails
/// - Server binding fails
/// - Server runtime error occurs
pub async fn run_server(config: Config) -> AppResult<()> {
    info!("Starting ConferenceTracker server...");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let environment = config.environment.name.clone();

    let mut startup = Startup::new(config);
    let (app, _services) = startup.build().await?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    info!("Server listening on {}", addr);
    info!("Hosting environment: {}", environment);

    axum::serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves when Ctrl+C or, on Unix, SIGTERM is received.
///
/// # Panics
///
/// Panics if signal handler installation fails; without it the process could
/// not be shut down gracefully at all.
async fn create_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    info!("Shutdown signal received");
}
