//! IPC Server for the blind clock.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for clock commands
//! - Newline-delimited notification streaming for `subscribe`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{timeout, Duration};

use crate::types::{IpcRequest, IpcResponse};

use super::broadcast::Notification;
use super::service::{ClockService, Outcome};
use super::timer::ClockSignal;

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (64KB)
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Socket binding error
    #[error("Failed to bind socket {path:?}: {source}")]
    BindError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(#[source] std::io::Error),

    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(#[source] std::io::Error),

    /// Write error
    #[error("Failed to write response: {0}")]
    WriteError(#[source] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,

    /// Client closed the connection without sending anything
    #[error("Connection closed by client")]
    ConnectionClosed,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// A stale socket file is removed and the parent directory is created
    /// before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self, IpcError> {
        let bind_error = |source| IpcError::BindError {
            path: socket_path.to_path_buf(),
            source,
        };

        if socket_path.exists() {
            std::fs::remove_file(socket_path).map_err(bind_error)?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(bind_error)?;
        }

        let listener = UnixListener::bind(socket_path).map_err(bind_error)?;
        tracing::info!("Listening on {:?}", socket_path);

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream, IpcError> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .map_err(IpcError::ConnectionError)?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// A request ends when the client half-closes or at its first newline,
    /// bounded by `MAX_REQUEST_SIZE` and a read timeout. `subscribe` clients
    /// end the request with a newline and keep their write side open.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest, IpcError> {
        let buffer = timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            Self::read_request_bytes(stream),
        )
        .await
        .map_err(|_| IpcError::Timeout)??;

        if buffer.is_empty() {
            return Err(IpcError::ConnectionClosed);
        }

        Ok(serde_json::from_slice(&buffer)?)
    }

    async fn read_request_bytes(stream: &mut UnixStream) -> Result<Vec<u8>, IpcError> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let n = stream.read(&mut chunk).await.map_err(IpcError::ReadError)?;
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
            if buffer.len() > MAX_REQUEST_SIZE {
                return Err(IpcError::RequestTooLarge);
            }
            if chunk[..n].contains(&b'\n') {
                break;
            }
        }

        Ok(buffer)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(
        stream: &mut UnixStream,
        response: &IpcResponse,
    ) -> Result<(), IpcError> {
        let json = serde_json::to_vec(response)?;
        Self::write(stream, &json).await
    }

    /// Sends one notification as a JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_notification<W>(
        writer: &mut W,
        notification: &Notification,
    ) -> Result<(), IpcError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut line = serde_json::to_vec(notification)?;
        line.push(b'\n');
        Self::write(writer, &line).await
    }

    async fn write<W>(writer: &mut W, bytes: &[u8]) -> Result<(), IpcError>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(bytes).await.map_err(IpcError::WriteError)?;
        writer.flush().await.map_err(IpcError::WriteError)
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        // Clean up socket file on drop
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to the clock service.
#[derive(Clone)]
pub struct RequestHandler {
    /// Shared clock service
    service: Arc<ClockService>,
}

impl RequestHandler {
    /// Creates a new request handler for the given service.
    pub fn new(service: Arc<ClockService>) -> Self {
        Self { service }
    }

    /// Serves one connection: a single request/response, or a notification
    /// stream for `subscribe`.
    pub async fn handle_connection(&self, mut stream: UnixStream) -> Result<(), IpcError> {
        let request = match IpcServer::receive_request(&mut stream).await {
            Ok(request) => request,
            Err(IpcError::ConnectionClosed) => return Ok(()),
            Err(e) => {
                tracing::warn!("Rejected request: {}", e);
                let response = IpcResponse::error(format!("Invalid request: {}", e));
                return IpcServer::send_response(&mut stream, &response).await;
            }
        };

        match request {
            IpcRequest::Subscribe => self.stream_notifications(&mut stream).await,
            request => {
                let response = self.handle(request).await;
                IpcServer::send_response(&mut stream, &response).await
            }
        }
    }

    /// Handles an IPC request and returns the appropriate response.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Start => {
                let outcome = self.service.start().await;
                respond(outcome, "Clock started", "")
            }
            IpcRequest::Pause => {
                let outcome = self.service.pause().await;
                respond(outcome, "Clock paused", "Clock is not running")
            }
            IpcRequest::Resume => {
                let outcome = self.service.resume().await;
                respond(outcome, "Clock resumed", "Clock is not paused")
            }
            IpcRequest::Reset => {
                let outcome = self.service.reset().await;
                respond(outcome, "Clock reset to level 1", "")
            }
            IpcRequest::Next => {
                let outcome = self.service.next_level().await;
                let message = level_message(&outcome);
                respond(outcome, &message, "")
            }
            IpcRequest::Prev => {
                let outcome = self.service.prev_level().await;
                let message = level_message(&outcome);
                respond(outcome, &message, "")
            }
            IpcRequest::Status => IpcResponse::success("", Some(self.service.snapshot().await)),
            IpcRequest::SetSchedule { levels } => {
                let outcome = self.service.set_schedule(&levels).await;
                let message = format!(
                    "Schedule installed ({} levels)",
                    outcome.snapshot.schedule.len()
                );
                respond(outcome, &message, "")
            }
            IpcRequest::SetAlerts { seconds } => {
                let outcome = self.service.set_alert_thresholds(&seconds).await;
                respond(outcome, "Alert thresholds updated", "")
            }
            IpcRequest::UpdateSettings { settings } => {
                let outcome = self.service.update_settings(&settings).await;
                respond(outcome, "Settings updated", "")
            }
            IpcRequest::Init { settings } => {
                let outcome = self.service.init(&settings).await;
                respond(outcome, "Clock initialised", "")
            }
            IpcRequest::Preset { preset } => {
                let outcome = self.service.apply_preset(preset).await;
                let message = format!("Preset applied: {}", preset.structure().label);
                respond(outcome, &message, "")
            }
            IpcRequest::Sound {
                kind,
                sound_id,
                volume,
            } => {
                let cue = self
                    .service
                    .play_sound(kind.as_deref(), sound_id.as_deref(), volume)
                    .await;
                IpcResponse::success(format!("Sound cue sent: {} ({})", cue.kind, cue.sound_id), None)
            }
            IpcRequest::Subscribe => {
                IpcResponse::error("subscribe needs a streaming connection")
            }
        }
    }

    /// Streams the current snapshot, then every notification, as JSON lines.
    ///
    /// Ends when the observer closes its side of the connection, even while
    /// nothing is being published.
    async fn stream_notifications(&self, stream: &mut UnixStream) -> Result<(), IpcError> {
        let (snapshot, mut receiver) = self.service.subscribe().await;
        tracing::info!(
            "Observer subscribed ({} total)",
            self.service.broadcaster().subscriber_count()
        );

        let (mut reader, mut writer) = stream.split();
        IpcServer::send_notification(&mut writer, &Notification::State(snapshot)).await?;

        let mut discard = [0u8; 256];
        loop {
            tokio::select! {
                read = reader.read(&mut discard) => match read {
                    Ok(0) | Err(_) => {
                        tracing::info!("Observer disconnected");
                        break;
                    }
                    Ok(_) => {}
                },
                received = receiver.recv() => match received {
                    Ok(notification) => {
                        IpcServer::send_notification(&mut writer, &notification).await?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Observer lagged, skipped {} notifications", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        Ok(())
    }
}

/// Builds the response for a command outcome.
fn respond(outcome: Outcome, applied: &str, ignored: &str) -> IpcResponse {
    let message = if outcome.applied { applied } else { ignored };
    IpcResponse::success(message, Some(outcome.snapshot))
}

/// Describes where a navigation command left the clock.
fn level_message(outcome: &Outcome) -> String {
    let snapshot = &outcome.snapshot;
    let level = snapshot.current_level();

    if outcome
        .signals
        .iter()
        .any(|s| matches!(s, ClockSignal::EventComplete { .. }))
    {
        return format!("Event complete (level {})", snapshot.current_level_index + 1);
    }

    if level.is_break {
        format!("Level {}: break", snapshot.current_level_index + 1)
    } else {
        format!(
            "Level {}: {}/{}",
            snapshot.current_level_index + 1,
            level.small_blind,
            level.big_blind
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
