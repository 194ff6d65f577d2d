//! Daemon module for the blind clock.
//!
//! This module contains the core daemon functionality:
//! - `clock`: Remaining-time computation from absolute instants
//! - `alert`: Alert threshold edge detection
//! - `timer`: Timer engine with state transitions and auto-advance
//! - `scheduler`: Cancellable periodic tick loop
//! - `broadcast`: Notification fan-out and sound cue dispatch
//! - `service`: The clock instance tying the pieces together
//! - `ipc`: Unix socket server and request dispatch

pub mod alert;
pub mod broadcast;
pub mod clock;
pub mod ipc;
pub mod scheduler;
pub mod service;
pub mod timer;

pub use broadcast::{Broadcaster, Notification, SoundCue};
pub use ipc::{IpcError, IpcServer, RequestHandler};
pub use service::{ClockService, Outcome};
pub use timer::{ClockSignal, Navigation, TimerEngine, Transition};

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::types::ClockConfig;

/// Runs the clock daemon until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the socket cannot be bound.
pub async fn run(config: ClockConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let socket_path = config
        .resolve_socket_path()
        .context("Failed to resolve socket path")?;

    let service = ClockService::new(&config);
    let snapshot = service.snapshot().await;
    tracing::info!(
        "Clock ready ({} levels, alerts at {:?}s)",
        snapshot.schedule.len(),
        snapshot.alert_thresholds.as_slice()
    );

    serve(&socket_path, service).await
}

/// Serves `service` on `socket_path` until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the socket cannot be bound.
pub async fn serve(socket_path: &Path, service: Arc<ClockService>) -> Result<()> {
    let server = IpcServer::new(socket_path).context("Failed to start IPC server")?;
    let handler = RequestHandler::new(service);

    tokio::select! {
        _ = accept_loop(&server, handler) => {}
        result = shutdown_signal() => {
            result.context("Failed to install signal handlers")?;
        }
    }

    tracing::info!("Daemon shutdown complete");
    Ok(())
}

/// Accepts connections forever, serving each on its own task.
async fn accept_loop(server: &IpcServer, handler: RequestHandler) {
    loop {
        match server.accept().await {
            Ok(stream) => {
                let handler = handler.clone();
                tokio::spawn(async move {
                    if let Err(e) = handler.handle_connection(stream).await {
                        tracing::debug!("Connection ended: {}", e);
                    }
                });
            }
            Err(e) => tracing::warn!("Failed to accept connection: {}", e),
        }
    }
}

/// Waits for SIGINT or SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Received SIGINT");
        }
        _ = terminate.recv() => {
            tracing::info!("Received SIGTERM");
        }
    }

    Ok(())
}
