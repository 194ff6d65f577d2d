//! IPC Client for communicating with the blind clock daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Timeout handling
//! - Notification streaming for `watch`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::cli::commands::SoundArgs;
use crate::daemon::Notification;
use crate::types::config::default_socket_path;
use crate::types::{IpcRequest, IpcResponse, StructurePreset};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (1MB)
const MAX_RESPONSE_SIZE: u64 = 1024 * 1024;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a new IPC client with default socket path.
    pub fn new() -> Result<Self> {
        let socket_path = default_socket_path()?;
        Ok(Self::with_socket_path(socket_path))
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Creates a client for `socket_path`, or the default path when `None`.
    pub fn from_option(socket_path: Option<PathBuf>) -> Result<Self> {
        match socket_path {
            Some(path) => Ok(Self::with_socket_path(path)),
            None => Self::new(),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends a start command to the daemon.
    pub async fn start(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Start).await
    }

    /// Sends a pause command to the daemon.
    pub async fn pause(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Pause).await
    }

    /// Sends a resume command to the daemon.
    pub async fn resume(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Resume).await
    }

    /// Sends a reset command to the daemon.
    pub async fn reset(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Reset).await
    }

    /// Sends a next-level command to the daemon.
    pub async fn next(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Next).await
    }

    /// Sends a previous-level command to the daemon.
    pub async fn prev(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Prev).await
    }

    /// Sends a status query to the daemon.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Status).await
    }

    /// Replaces the schedule with raw levels.
    pub async fn set_schedule(&self, levels: Value) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::SetSchedule { levels }).await
    }

    /// Replaces the alert thresholds.
    ///
    /// Values are sent as typed by the user; the daemon drops invalid ones.
    pub async fn set_alerts(&self, seconds: &[String]) -> Result<IpcResponse> {
        let seconds = seconds
            .iter()
            .map(|s| {
                let s = s.trim();
                s.parse::<u64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(s.to_string()))
            })
            .collect();
        self.send_request(&IpcRequest::SetAlerts { seconds }).await
    }

    /// Merges event settings.
    pub async fn update_settings(&self, settings: Map<String, Value>) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::UpdateSettings { settings })
            .await
    }

    /// Initialises settings, levels and alerts, then resets.
    pub async fn init(&self, settings: Map<String, Value>) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Init { settings }).await
    }

    /// Applies a built-in structure.
    pub async fn preset(&self, preset: StructurePreset) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Preset { preset }).await
    }

    /// Relays a sound cue to every observer.
    pub async fn sound(&self, args: &SoundArgs) -> Result<IpcResponse> {
        let request = IpcRequest::Sound {
            kind: args.kind.clone(),
            sound_id: args.sound_id.clone(),
            volume: args.volume,
        };
        self.send_request(&request).await
    }

    /// Opens a notification stream.
    pub async fn subscribe(&self) -> Result<NotificationStream> {
        let mut stream = self.connect_with_retry().await?;
        // The write side stays open; closing it ends the subscription
        self.write_request(&mut stream, &IpcRequest::Subscribe)
            .await?;

        Ok(NotificationStream {
            lines: BufReader::new(stream).lines(),
        })
    }

    /// Sends one request and reads the response.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut stream = self.connect_with_retry().await?;
        self.write_request(&mut stream, request).await?;

        // Shutdown write side to signal end of request
        stream
            .shutdown()
            .await
            .context("Failed to finish request")?;

        let mut buffer = Vec::new();
        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            (&mut stream).take(MAX_RESPONSE_SIZE).read_to_end(&mut buffer),
        )
        .await
        .context("Timed out waiting for the daemon")?
        .context("Failed to receive response")?;

        if buffer.is_empty() {
            anyhow::bail!("The daemon closed the connection without responding");
        }

        let response: IpcResponse =
            serde_json::from_slice(&buffer).context("Failed to parse response")?;

        if !response.is_success() {
            anyhow::bail!("{}", response.message);
        }

        Ok(response)
    }

    /// Serializes a request as one newline-terminated line.
    async fn write_request(&self, stream: &mut UnixStream, request: &IpcRequest) -> Result<()> {
        let mut request_json =
            serde_json::to_vec(request).context("Failed to serialize request")?;
        request_json.push(b'\n');

        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            stream.write_all(&request_json),
        )
        .await
        .context("Timed out sending request")?
        .context("Failed to send request")?;

        Ok(())
    }

    /// Connects to the daemon, retrying with linear backoff.
    async fn connect_with_retry(&self) -> Result<UnixStream> {
        let mut attempt = 1;

        loop {
            match self.connect().await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < MAX_RETRIES => {
                    tracing::warn!("Connection failed (attempt {}/{}): {}", attempt, MAX_RETRIES, e);
                    let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Connects once, with timeout.
    async fn connect(&self) -> Result<UnixStream> {
        timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timed out")?
            .with_context(|| {
                format!(
                    "Cannot connect to the daemon at {:?}. Run 'blindclock daemon' first",
                    self.socket_path
                )
            })
    }
}

// ============================================================================
// NotificationStream
// ============================================================================

/// Live notifications from a `subscribe` connection.
pub struct NotificationStream {
    lines: Lines<BufReader<UnixStream>>,
}

impl NotificationStream {
    /// Returns the next raw JSON line, or `None` when the daemon closed the stream.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        self.lines
            .next_line()
            .await
            .context("Failed to read notification")
    }

    /// Returns the next notification, or `None` when the daemon closed the stream.
    pub async fn next(&mut self) -> Result<Option<Notification>> {
        match self.next_line().await? {
            Some(line) => {
                let notification =
                    serde_json::from_str(&line).context("Failed to parse notification")?;
                Ok(Some(notification))
            }
            None => Ok(None),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertThresholds, ClockSnapshot, EventSettings, Schedule, TimerState};
    use std::sync::Arc;
    use tokio::net::UnixListener;
    use tokio::sync::Mutex;

    // ------------------------------------------------------------------------
    // Helper functions
    // ------------------------------------------------------------------------

    fn create_temp_socket_path() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        // Keep the directory so it's not deleted
        std::mem::forget(dir);
        path
    }

    fn create_mock_server(socket_path: &Path) -> UnixListener {
        let _ = std::fs::remove_file(socket_path);
        UnixListener::bind(socket_path).unwrap()
    }

    fn snapshot() -> ClockSnapshot {
        let state = TimerState::new(Schedule::default(), AlertThresholds::default());
        ClockSnapshot::from_state(&state, &EventSettings::default())
    }

    /// Serves one connection: records the request and replies with `response`.
    fn serve_once(
        listener: UnixListener,
        response: IpcResponse,
    ) -> (Arc<Mutex<Option<IpcRequest>>>, tokio::task::JoinHandle<()>) {
        let received = Arc::new(Mutex::new(None));
        let received_clone = received.clone();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            let mut buffer = Vec::new();
            stream.read_to_end(&mut buffer).await.unwrap();
            let request: IpcRequest = serde_json::from_slice(&buffer).unwrap();
            *received_clone.lock().await = Some(request);

            let json = serde_json::to_vec(&response).unwrap();
            stream.write_all(&json).await.unwrap();
        });

        (received, handle)
    }

    // ------------------------------------------------------------------------
    // IpcClient Tests
    // ------------------------------------------------------------------------

    mod client_tests {
        use super::*;

        #[test]
        fn test_with_socket_path() {
            let path = PathBuf::from("/tmp/test.sock");
            let client = IpcClient::with_socket_path(path.clone());
            assert_eq!(client.socket_path(), path.as_path());
        }

        #[test]
        fn test_from_option() {
            let client = IpcClient::from_option(Some(PathBuf::from("/tmp/x.sock"))).unwrap();
            assert_eq!(client.socket_path(), Path::new("/tmp/x.sock"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_connection_failure() {
            let socket_path = PathBuf::from("/tmp/nonexistent_blindclock_12345.sock");
            let client = IpcClient::with_socket_path(socket_path);

            let result = client.status().await;

            let message = format!("{:#}", result.unwrap_err());
            assert!(message.contains("blindclock daemon"), "{}", message);
        }

        #[tokio::test]
        async fn test_send_status_request() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let (received, handle) =
                serve_once(listener, IpcResponse::success("", Some(snapshot())));

            let client = IpcClient::with_socket_path(socket_path);
            let response = client.status().await.unwrap();

            assert!(response.is_success());
            assert_eq!(response.data.unwrap().remaining_seconds, 1200);
            assert!(matches!(*received.lock().await, Some(IpcRequest::Status)));

            handle.await.unwrap();
        }

        #[tokio::test]
        async fn test_send_start_request() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let (received, handle) =
                serve_once(listener, IpcResponse::success("Clock started", Some(snapshot())));

            let client = IpcClient::with_socket_path(socket_path);
            let response = client.start().await.unwrap();

            assert_eq!(response.message, "Clock started");
            assert!(matches!(*received.lock().await, Some(IpcRequest::Start)));

            handle.await.unwrap();
        }

        #[tokio::test]
        async fn test_set_alerts_keeps_raw_values() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let (received, handle) = serve_once(listener, IpcResponse::success("OK", None));

            let client = IpcClient::with_socket_path(socket_path);
            let seconds = vec!["60".to_string(), " 10 ".to_string(), "soon".to_string()];
            client.set_alerts(&seconds).await.unwrap();

            handle.await.unwrap();
            match received.lock().await.as_ref() {
                Some(IpcRequest::SetAlerts { seconds }) => {
                    assert_eq!(
                        seconds,
                        &vec![Value::from(60u64), Value::from(10u64), Value::from("soon")]
                    );
                }
                other => panic!("Expected SetAlerts, got {:?}", other),
            };
        }

        #[tokio::test]
        async fn test_send_preset_request() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let (received, handle) = serve_once(listener, IpcResponse::success("OK", None));

            let client = IpcClient::with_socket_path(socket_path);
            client.preset(StructurePreset::Standard).await.unwrap();

            handle.await.unwrap();
            assert!(matches!(
                *received.lock().await,
                Some(IpcRequest::Preset {
                    preset: StructurePreset::Standard
                })
            ));
        }

        #[tokio::test]
        async fn test_error_response() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let (_, handle) = serve_once(listener, IpcResponse::error("Invalid request: boom"));

            let client = IpcClient::with_socket_path(socket_path);
            let result = client.status().await;

            let message = result.unwrap_err().to_string();
            assert!(message.contains("boom"), "got: {}", message);

            handle.await.unwrap();
        }
    }

    // ------------------------------------------------------------------------
    // NotificationStream Tests
    // ------------------------------------------------------------------------

    mod notification_stream_tests {
        use super::*;

        #[tokio::test]
        async fn test_subscribe_reads_lines() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);

            let server = tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                // The request is a single line; the client keeps its write side open
                let mut request = String::new();
                tokio::io::AsyncBufReadExt::read_line(
                    &mut tokio::io::BufReader::new(&mut stream),
                    &mut request,
                )
                .await
                .unwrap();
                let request: IpcRequest = serde_json::from_str(&request).unwrap();
                assert!(matches!(request, IpcRequest::Subscribe));

                let mut line = serde_json::to_vec(&Notification::State(snapshot())).unwrap();
                line.push(b'\n');
                stream.write_all(&line).await.unwrap();
            });

            let client = IpcClient::with_socket_path(socket_path);
            let mut notifications = client.subscribe().await.unwrap();

            let first = notifications.next().await.unwrap();
            assert!(matches!(first, Some(Notification::State(_))));
            assert!(notifications.next().await.unwrap().is_none());

            server.await.unwrap();
        }
    }
}
