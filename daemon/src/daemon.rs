//! Server runner: model first, then socket, then the accept loop.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::handler::ConnectionLimits;
use crate::server::{SocketSetupError, all_interfaces, bind_listener, serve};
use crate::transcribe::{InferenceAdapter, Transcriber};

/// Failures that stop the server before it serves anything.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load model: {0:#}")]
    ModelLoad(anyhow::Error),

    #[error(transparent)]
    SocketSetup(#[from] SocketSetupError),
}

/// Load the engine, logging the start and the result.
///
/// Nothing is bound if this fails.
pub fn load_model<T, F>(load: F) -> Result<T, StartupError>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    info!("Loading model");
    match load() {
        Ok(engine) => {
            info!("Model loaded");
            Ok(engine)
        }
        Err(e) => {
            error!(error = format!("{e:#}"), "Failed to load model");
            Err(StartupError::ModelLoad(e))
        }
    }
}

/// Serve with an already loaded engine until `shutdown` is cancelled.
///
/// The engine is dropped, freeing the model, before this returns.
pub async fn run_with_engine<T>(
    config: &Config,
    engine: T,
    shutdown: CancellationToken,
) -> Result<(), StartupError>
where
    T: Transcriber + 'static,
{
    let addr = all_interfaces(config.server.port);
    let listener = bind_listener(addr, config.server.backlog).inspect_err(|e| {
        error!(error = %e, "Socket setup failed");
    })?;
    info!(port = config.server.port, "Listening");

    let adapter = InferenceAdapter::new(engine);
    serve(
        listener,
        adapter,
        ConnectionLimits::from(&config.server),
        shutdown,
    )
    .await;

    info!("Model released, server stopped");
    Ok(())
}

/// Run the server until Ctrl-C or SIGTERM.
///
/// The first signal stops the accept loop and abandons a request that is
/// still being read. A second one exits at once, even mid-inference.
pub async fn run<T>(config: &Config, engine: T) -> Result<(), StartupError>
where
    T: Transcriber + 'static,
{
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        trigger.cancel();

        shutdown_signal().await;
        warn!("Second shutdown signal received, exiting immediately");
        std::process::exit(1);
    });

    run_with_engine(config, engine, shutdown).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
#[path = "daemon_test.rs"]
mod tests;
