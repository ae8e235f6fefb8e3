//! Auto-reconnecting obs-websocket session client.
//!
//! The [`SessionClient`] owns nothing but channels: a background Tokio task
//! owns the WebSocket, performs the Hello/Identify handshake, routes
//! `RequestResponse` frames back to callers and reconnects with exponential
//! backoff whenever the connection is lost.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         SessionClient                          │
//! │                                                                │
//! │  ┌──────────────────┐        ┌──────────────────────────────┐  │
//! │  │   Public API     │        │   Background Task            │  │
//! │  │                  │        │                              │  │
//! │  │  request() ──────┼──cmd──▶│  connect → Hello → Identify  │  │
//! │  │  reconnect_now() │  chan  │  read/write/keepalive loop   │  │
//! │  │  close()         │        │  backoff sleep (cancellable) │  │
//! │  │                  │        │                              │  │
//! │  │  state() ◀───────┼─watch─◀│  ConnectionState snapshots   │  │
//! │  └──────────────────┘        └──────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first connection attempt starts as soon as the client is spawned.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use obs_remote_core::prelude::*;

use crate::protocol::{
    close_code_to_error, parse_server_message, request_type, response_to_result, Identify,
    Request, RequestTracker, ServerMessage,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Capacity of the command channel.
const CMD_CHANNEL_CAPACITY: usize = 32;

/// Requests older than this are dropped from the tracker on keepalive ticks.
const STALE_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Keepalive misses tolerated before the connection is declared dead.
const KEEPALIVE_MISSES: u32 = 2;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How a command behaves while no authenticated connection exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandMode {
    /// Wait up to the command timeout for the connection to come up.
    #[default]
    Wait,
    /// Fail with `Unavailable` immediately.
    FailFast,
}

impl fmt::Display for CommandMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandMode::Wait => f.write_str("wait"),
            CommandMode::FailFast => f.write_str("fail-fast"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    /// Empty when the server does not require authentication.
    pub password: String,
    pub mode: CommandMode,
    pub command_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub keepalive_interval: Duration,
    pub handshake_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4455,
            password: String::new(),
            mode: CommandMode::Wait,
            command_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Authenticated,
}

/// Snapshot of the session published by the background task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    phase: ConnectionPhase,
    retry_count: u32,
    last_error: Option<ErrorKind>,
}

impl ConnectionState {
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Consecutive failed attempts since the last successful handshake.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == ConnectionPhase::Authenticated
    }
}

// ---------------------------------------------------------------------------
// Internal command type
// ---------------------------------------------------------------------------

enum ClientCommand {
    SendRequest {
        request_type: String,
        data: Option<Value>,
        response_tx: oneshot::Sender<Result<Option<Value>>>,
    },
    /// Skip the remaining backoff delay.
    ReconnectNow,
    /// Close gracefully and stop; `done_tx` fires once the task is finished.
    Disconnect { done_tx: oneshot::Sender<()> },
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// SessionClient
// ---------------------------------------------------------------------------

/// Clonable handle to the background session task.
///
/// The task exits after [`close`](Self::close) or once every handle has been
/// dropped.
#[derive(Clone)]
pub struct SessionClient {
    cmd_tx: mpsc::Sender<ClientCommand>,
    state_rx: watch::Receiver<ConnectionState>,
    config: Arc<SessionConfig>,
}

impl fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClient")
            .field("url", &self.config.url())
            .field("state", &*self.state_rx.borrow())
            .finish()
    }
}

impl SessionClient {
    /// Spawn the background task and start connecting immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(config: SessionConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::default());
        let config = Arc::new(config);

        tokio::spawn(run_client_task(Arc::clone(&config), cmd_rx, state_tx));

        Self {
            cmd_tx,
            state_rx,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Receiver that observes every published state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state_rx.borrow().is_authenticated()
    }

    /// Wait up to `timeout` for an authenticated connection.
    pub async fn wait_authenticated(&self, timeout: Duration) -> bool {
        let mut rx = self.state_rx.clone();
        let authenticated = matches!(
            tokio::time::timeout(timeout, rx.wait_for(ConnectionState::is_authenticated)).await,
            Ok(Ok(_))
        );
        authenticated
    }

    /// Send a request and wait for its response data.
    ///
    /// # Errors
    ///
    /// - [`Error::Unavailable`] if no authenticated connection is available
    ///   (immediately in fail-fast mode, after `command_timeout` otherwise).
    /// - [`Error::CommandTimeout`] if the request was sent but not answered
    ///   within `command_timeout`.
    /// - [`Error::Transport`] if the connection dropped before the answer.
    /// - [`Error::RequestRejected`] if OBS answered with a failure status.
    pub async fn request(&self, request_type: &str, data: Option<Value>) -> Result<Option<Value>> {
        self.ensure_authenticated().await?;

        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(ClientCommand::SendRequest {
                request_type: request_type.to_string(),
                data,
                response_tx,
            })
            .await
            .map_err(|_| Error::ChannelClosed)?;

        let waited = self.config.command_timeout;
        match tokio::time::timeout(waited, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => Err(Error::CommandTimeout {
                request_type: request_type.to_string(),
                waited,
            }),
        }
    }

    /// `ToggleRecord`: success means OBS acknowledged the toggle.
    pub async fn toggle_record(&self) -> Result<()> {
        self.request(request_type::TOGGLE_RECORD, None).await?;
        Ok(())
    }

    /// `GetRecordStatus`: whether a recording is currently active.
    pub async fn record_status(&self) -> Result<bool> {
        let data = self
            .request(request_type::GET_RECORD_STATUS, None)
            .await?
            .ok_or_else(|| Error::protocol("GetRecordStatus returned no data"))?;
        data.get("outputActive")
            .and_then(Value::as_bool)
            .ok_or_else(|| Error::protocol("GetRecordStatus response lacks outputActive"))
    }

    /// Cut a pending backoff delay short.
    ///
    /// Does not reset the retry count. A no-op while connecting or connected.
    pub fn reconnect_now(&self) {
        if self.cmd_tx.try_send(ClientCommand::ReconnectNow).is_err() {
            debug!("Reconnect request dropped, command channel full or closed");
        }
    }

    /// Close the connection gracefully and wait for the task to finish.
    pub async fn close(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(ClientCommand::Disconnect { done_tx })
            .await
            .is_err()
        {
            return;
        }
        let _ = done_rx.await;
    }

    async fn ensure_authenticated(&self) -> Result<()> {
        if self.is_authenticated() {
            return Ok(());
        }
        match self.config.mode {
            CommandMode::FailFast => Err(Error::Unavailable {
                waited: Duration::ZERO,
            }),
            CommandMode::Wait => {
                let waited = self.config.command_timeout;
                debug!("Waiting up to {:?} for OBS connection", waited);
                if self.wait_authenticated(waited).await {
                    Ok(())
                } else {
                    Err(Error::Unavailable { waited })
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// Why the I/O loop returned.
enum IoExit {
    Lost(Error),
    Stop(Option<oneshot::Sender<()>>),
}

/// What an offline command asks the task to do.
enum Offline {
    Continue,
    ReconnectNow,
    Stop(Option<oneshot::Sender<()>>),
}

struct StatePublisher {
    tx: watch::Sender<ConnectionState>,
    retry_count: u32,
    last_error: Option<ErrorKind>,
}

impl StatePublisher {
    fn publish(&self, phase: ConnectionPhase) {
        self.tx.send_replace(ConnectionState {
            phase,
            retry_count: self.retry_count,
            last_error: self.last_error,
        });
    }

    fn authenticated(&mut self) {
        self.retry_count = 0;
        self.last_error = None;
        self.publish(ConnectionPhase::Authenticated);
    }

    fn failed(&mut self, err: &Error) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_error = Some(err.kind());
        self.publish(ConnectionPhase::Disconnected);
    }
}

async fn run_client_task(
    config: Arc<SessionConfig>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
    state_tx: watch::Sender<ConnectionState>,
) {
    let url = config.url();
    let mut tracker = RequestTracker::new();
    let mut state = StatePublisher {
        tx: state_tx,
        retry_count: 0,
        last_error: None,
    };
    let mut done_tx = None;

    'session: loop {
        state.publish(ConnectionPhase::Connecting);
        debug!("Connecting to OBS at {} (retry {})", url, state.retry_count);

        let attempt = connect_and_identify(&config);
        tokio::pin!(attempt);
        let connected = loop {
            tokio::select! {
                result = &mut attempt => break result,
                cmd = cmd_rx.recv() => {
                    if let Offline::Stop(tx) = offline_command(cmd) {
                        done_tx = tx;
                        break 'session;
                    }
                }
            }
        };

        let err = match connected {
            Ok(ws) => {
                state.authenticated();
                info!("Connected to OBS at {}", url);

                match run_io_loop(ws, &mut cmd_rx, &mut tracker, &config).await {
                    IoExit::Stop(tx) => {
                        done_tx = tx;
                        break 'session;
                    }
                    IoExit::Lost(err) => {
                        let abandoned = tracker.fail_all();
                        if !abandoned.is_empty() {
                            debug!("Abandoned pending requests: {:?}", abandoned);
                        }
                        warn!("Lost connection to OBS: {}", err);
                        err
                    }
                }
            }
            Err(err) => {
                match err.kind() {
                    ErrorKind::AuthRejected => warn!(
                        "OBS rejected the password, retrying with the same credential: {}",
                        err
                    ),
                    _ if !err.is_recoverable() => error!("Unexpected connection error: {}", err),
                    _ if state.retry_count == 0 => warn!("Cannot connect to OBS: {}", err),
                    _ => debug!("Connection attempt failed: {}", err),
                }
                err
            }
        };

        state.failed(&err);
        let delay = compute_backoff(
            state.retry_count,
            config.initial_backoff,
            config.max_backoff,
        );
        debug!("Reconnecting in {:?} (retry {})", delay, state.retry_count);

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                cmd = cmd_rx.recv() => match offline_command(cmd) {
                    Offline::Continue => {}
                    Offline::ReconnectNow => {
                        debug!("Backoff cut short");
                        break;
                    }
                    Offline::Stop(tx) => {
                        done_tx = tx;
                        break 'session;
                    }
                },
            }
        }
    }

    tracker.fail_all();
    state.publish(ConnectionPhase::Disconnected);
    debug!("Session task exiting");
    if let Some(done_tx) = done_tx {
        let _ = done_tx.send(());
    }
}

/// Handle a command that arrived while not authenticated.
fn offline_command(cmd: Option<ClientCommand>) -> Offline {
    match cmd {
        Some(ClientCommand::SendRequest {
            request_type,
            response_tx,
            ..
        }) => {
            debug!("Rejecting {} while disconnected", request_type);
            let _ = response_tx.send(Err(Error::Unavailable {
                waited: Duration::ZERO,
            }));
            Offline::Continue
        }
        Some(ClientCommand::ReconnectNow) => Offline::ReconnectNow,
        Some(ClientCommand::Disconnect { done_tx }) => Offline::Stop(Some(done_tx)),
        None => Offline::Stop(None),
    }
}

/// Open the socket and complete the handshake within `handshake_timeout`.
async fn connect_and_identify(config: &SessionConfig) -> Result<WsStream> {
    tokio::time::timeout(config.handshake_timeout, handshake(config))
        .await
        .map_err(|_| {
            Error::transport(format!(
                "handshake with {} timed out after {:?}",
                config.url(),
                config.handshake_timeout
            ))
        })?
}

async fn handshake(config: &SessionConfig) -> Result<WsStream> {
    let url = config.url();
    let (mut ws, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| Error::transport(format!("connect to {url}: {e}")))?;

    let hello = match next_message(&mut ws).await? {
        ServerMessage::Hello(hello) => hello,
        other => return Err(Error::protocol(format!("expected Hello, got {other:?}"))),
    };
    if hello.authentication.is_some() && config.password.is_empty() {
        warn!("OBS requires a password but none is configured");
    }

    let identify = Identify::for_hello(&hello, &config.password).to_frame()?;
    ws.send(WsMessage::Text(identify.into()))
        .await
        .map_err(|e| Error::transport(format!("send Identify: {e}")))?;

    loop {
        match next_message(&mut ws).await? {
            ServerMessage::Identified(identified) => {
                debug!(
                    "Identified, negotiated RPC version {}",
                    identified.negotiated_rpc_version
                );
                return Ok(ws);
            }
            other => trace!("Ignoring message during handshake: {:?}", other),
        }
    }
}

/// Read the next text frame during the handshake.
async fn next_message(ws: &mut WsStream) -> Result<ServerMessage> {
    loop {
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => return Ok(parse_server_message(text.as_str())),
            Some(Ok(WsMessage::Close(frame))) => {
                return Err(match frame {
                    Some(frame) => close_code_to_error(u16::from(frame.code), frame.reason.as_str()),
                    None => Error::transport("connection closed during handshake"),
                });
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(Error::transport(format!("read: {e}"))),
            None => return Err(Error::transport("connection closed during handshake")),
        }
    }
}

/// Run one authenticated connection's read/write/keepalive loop.
async fn run_io_loop(
    ws: WsStream,
    cmd_rx: &mut mpsc::Receiver<ClientCommand>,
    tracker: &mut RequestTracker,
    config: &SessionConfig,
) -> IoExit {
    let (mut ws_sink, mut ws_stream) = ws.split();

    let mut keepalive = tokio::time::interval(config.keepalive_interval);
    keepalive.tick().await; // consume the immediate first tick
    let dead_after = config.keepalive_interval.saturating_mul(KEEPALIVE_MISSES);
    let mut last_inbound = Instant::now();

    loop {
        tokio::select! {
            frame = ws_stream.next() => {
                match frame {
                    Some(Ok(msg)) => {
                        last_inbound = Instant::now();
                        match msg {
                            WsMessage::Text(text) => handle_ws_text(text.as_str(), tracker),
                            WsMessage::Close(frame) => {
                                let err = match frame {
                                    Some(frame) => close_code_to_error(
                                        u16::from(frame.code),
                                        frame.reason.as_str(),
                                    ),
                                    None => Error::transport("server closed the connection"),
                                };
                                return IoExit::Lost(err);
                            }
                            _ => {}
                        }
                    }
                    Some(Err(e)) => return IoExit::Lost(Error::transport(format!("read: {e}"))),
                    None => return IoExit::Lost(Error::transport("connection stream ended")),
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::SendRequest { request_type, data, response_tx }) => {
                        if let Err(err) =
                            send_request(request_type, data, response_tx, tracker, &mut ws_sink).await
                        {
                            return IoExit::Lost(err);
                        }
                    }
                    Some(ClientCommand::ReconnectNow) => trace!("Already connected"),
                    Some(ClientCommand::Disconnect { done_tx }) => {
                        send_close(&mut ws_sink).await;
                        return IoExit::Stop(Some(done_tx));
                    }
                    None => {
                        debug!("All session handles dropped, closing");
                        send_close(&mut ws_sink).await;
                        return IoExit::Stop(None);
                    }
                }
            }

            _ = keepalive.tick() => {
                if last_inbound.elapsed() >= dead_after {
                    return IoExit::Lost(Error::transport(format!(
                        "no traffic from OBS for {:?}",
                        last_inbound.elapsed()
                    )));
                }
                if let Err(e) = ws_sink.send(WsMessage::Ping(Default::default())).await {
                    return IoExit::Lost(Error::transport(format!("keepalive ping: {e}")));
                }
                let stale = tracker.cleanup_stale(STALE_REQUEST_TIMEOUT);
                if !stale.is_empty() {
                    debug!("Dropped {} stale request(s): {:?}", stale.len(), stale);
                }
            }
        }
    }
}

fn handle_ws_text(text: &str, tracker: &mut RequestTracker) {
    match parse_server_message(text) {
        ServerMessage::RequestResponse(response) => {
            let id = response.request_id.clone();
            if !tracker.complete(&id, response) {
                debug!("Response for unknown request id {}", id);
            }
        }
        ServerMessage::Event(event) if event.event_type == "ExitStarted" => {
            info!("OBS is shutting down");
        }
        ServerMessage::Event(event) => trace!("OBS event {}", event.event_type),
        ServerMessage::Hello(_) | ServerMessage::Identified(_) => {
            debug!("Unexpected handshake message on an established session");
        }
        ServerMessage::Unknown(raw) => {
            debug!(
                "Ignoring unknown message: {}",
                raw.chars().take(120).collect::<String>()
            );
        }
    }
}

/// Register, serialize and write one request.
///
/// The caller's `response_tx` always receives an outcome. A write failure is
/// also returned so the connection is treated as lost.
async fn send_request(
    request_type: String,
    data: Option<Value>,
    response_tx: oneshot::Sender<Result<Option<Value>>>,
    tracker: &mut RequestTracker,
    ws_sink: &mut SplitSink<WsStream, WsMessage>,
) -> Result<()> {
    // Register before writing so a fast response always finds its slot.
    let (id, response_rx) = tracker.register(request_type.as_str());

    let frame = match Request::new(id.clone(), request_type.as_str(), data).to_frame() {
        Ok(frame) => frame,
        Err(err) => {
            tracker.cancel(&id);
            let _ = response_tx.send(Err(err));
            return Ok(());
        }
    };

    if let Err(e) = ws_sink.send(WsMessage::Text(frame.into())).await {
        tracker.cancel(&id);
        let message = format!("send {request_type}: {e}");
        let _ = response_tx.send(Err(Error::transport(message.clone())));
        return Err(Error::transport(message));
    }
    trace!("Sent {} ({})", request_type, id);

    tokio::spawn(async move {
        let result = match response_rx.await {
            Ok(response) => response_to_result(response),
            Err(_) => Err(Error::transport(format!(
                "connection lost before {request_type} was answered"
            ))),
        };
        let _ = response_tx.send(result);
    });
    Ok(())
}

async fn send_close(ws_sink: &mut SplitSink<WsStream, WsMessage>) {
    let _ = ws_sink.send(WsMessage::Close(None)).await;
    let _ = ws_sink.close().await;
}

/// Delay before reconnect attempt number `retry_count`.
///
/// `initial * 2^(retry_count - 1)`, capped at `max`; `retry_count` 0 uses
/// `initial`.
pub fn compute_backoff(retry_count: u32, initial: Duration, max: Duration) -> Duration {
    let exponent = retry_count.saturating_sub(1);
    let multiplier = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    initial.saturating_mul(multiplier).min(max)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
