//! Mock obs-websocket server for integration testing
//!
//! Speaks enough of the v5 protocol (Hello, Identify, Identified, Request,
//! RequestResponse) to drive the session client over a real loopback
//! WebSocket, without an OBS installation.
//!
//! # Limitations
//!
//! - Only `ToggleRecord` and `GetRecordStatus` are implemented; any other
//!   request type is answered with status code 204 (unknown request type).
//! - The salt and challenge are fixed.
//! - No events are sent except on demand.
//!
//! # Usage Example
//!
//! ```ignore
//! let server = MockObs::start(MockBehavior::with_password("secret")).await;
//! let client = SessionClient::spawn(server.session_config("secret"));
//! assert!(client.wait_authenticated(Duration::from_secs(2)).await);
//! client.toggle_record().await.unwrap();
//! assert_eq!(server.toggles(), 1);
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use obs_remote_session::{auth_response, SessionConfig};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

pub const SALT: &str = "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=";
pub const CHALLENGE: &str = "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=";

/// Runtime-adjustable server behaviour.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// `None` disables authentication.
    pub password: Option<String>,
    /// Current recording state, flipped by `ToggleRecord`.
    pub recording: bool,
    /// Read requests but never answer them.
    pub ignore_requests: bool,
    /// Answer `ToggleRecord` with a failure status.
    pub reject_toggle: bool,
    /// After the handshake, stop reading the socket entirely.
    pub stall: bool,
}

impl MockBehavior {
    pub fn with_password(password: &str) -> Self {
        Self {
            password: Some(password.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct Stats {
    connections: AtomicUsize,
    identified: AtomicUsize,
    requests: AtomicUsize,
    toggles: AtomicUsize,
    client_closes: AtomicUsize,
}

struct Shared {
    behavior: Mutex<MockBehavior>,
    stats: Stats,
}

/// Handle to a running mock server. Dropping it stops accepting.
pub struct MockObs {
    addr: SocketAddr,
    shared: Arc<Shared>,
    kick_tx: broadcast::Sender<()>,
    accept_task: JoinHandle<()>,
}

impl MockObs {
    /// Bind an ephemeral loopback port and start accepting.
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let shared = Arc::new(Shared {
            behavior: Mutex::new(behavior),
            stats: Stats::default(),
        });
        let (kick_tx, _) = broadcast::channel(4);

        let accept_shared = Arc::clone(&shared);
        let accept_kick = kick_tx.clone();
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_connection(
                    stream,
                    Arc::clone(&accept_shared),
                    accept_kick.subscribe(),
                ));
            }
        });

        Self {
            addr,
            shared,
            kick_tx,
            accept_task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Client config pointing at this server, with short timings for tests.
    pub fn session_config(&self, password: &str) -> SessionConfig {
        SessionConfig {
            host: "127.0.0.1".to_string(),
            port: self.port(),
            password: password.to_string(),
            command_timeout: Duration::from_millis(500),
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(200),
            keepalive_interval: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(2),
            ..SessionConfig::default()
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut MockBehavior)) {
        f(&mut self.shared.behavior.lock().unwrap());
    }

    pub fn recording(&self) -> bool {
        self.shared.behavior.lock().unwrap().recording
    }

    /// Abruptly drop every open connection (no Close frame).
    pub fn drop_connections(&self) {
        let _ = self.kick_tx.send(());
    }

    /// Stop accepting and drop every open connection.
    pub fn shutdown(&self) {
        self.accept_task.abort();
        self.drop_connections();
    }

    pub fn connections(&self) -> usize {
        self.shared.stats.connections.load(Ordering::SeqCst)
    }

    pub fn identified(&self) -> usize {
        self.shared.stats.identified.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.shared.stats.requests.load(Ordering::SeqCst)
    }

    pub fn toggles(&self) -> usize {
        self.shared.stats.toggles.load(Ordering::SeqCst)
    }

    pub fn client_closes(&self) -> usize {
        self.shared.stats.client_closes.load(Ordering::SeqCst)
    }

    /// Poll `check` until it holds or `timeout` expires.
    pub async fn wait_until(&self, timeout: Duration, check: impl Fn(&Self) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if check(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check(self)
    }
}

impl Drop for MockObs {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn frame(op: u8, d: Value) -> Message {
    Message::Text(json!({ "op": op, "d": d }).to_string().into())
}

async fn handle_connection(
    stream: TcpStream,
    shared: Arc<Shared>,
    mut kick_rx: broadcast::Receiver<()>,
) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    shared.stats.connections.fetch_add(1, Ordering::SeqCst);

    let password = shared.behavior.lock().unwrap().password.clone();
    if !handshake(&mut ws, password.as_deref()).await {
        return;
    }
    shared.stats.identified.fetch_add(1, Ordering::SeqCst);

    loop {
        let stall = shared.behavior.lock().unwrap().stall;
        if stall {
            // Hold the socket open without reading: pings go unanswered.
            let _ = kick_rx.recv().await;
            return;
        }

        tokio::select! {
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_request(text.as_str(), &shared) {
                        if ws.send(reply).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    shared.stats.client_closes.fetch_add(1, Ordering::SeqCst);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return,
            },
            _ = kick_rx.recv() => return,
        }
    }
}

/// Hello → Identify → Identified. Returns `false` if the client was rejected.
async fn handshake(ws: &mut WebSocketStream<TcpStream>, password: Option<&str>) -> bool {
    let mut hello = json!({ "obsWebSocketVersion": "5.5.0", "rpcVersion": 1 });
    if password.is_some() {
        hello["authentication"] = json!({ "challenge": CHALLENGE, "salt": SALT });
    }
    if ws.send(frame(0, hello)).await.is_err() {
        return false;
    }

    let identify: Value = loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str(text.as_str()) {
                Ok(value) => break value,
                Err(_) => return false,
            },
            Some(Ok(_)) => continue,
            _ => return false,
        }
    };
    assert_eq!(identify["op"], 1, "expected Identify, got {identify}");
    assert_eq!(identify["d"]["rpcVersion"], 1);

    if let Some(password) = password {
        let expected = auth_response(password, SALT, CHALLENGE);
        if identify["d"]["authentication"].as_str() != Some(expected.as_str()) {
            let _ = ws
                .close(Some(CloseFrame {
                    code: CloseCode::from(4009),
                    reason: "Authentication failed.".into(),
                }))
                .await;
            return false;
        }
    }

    ws.send(frame(2, json!({ "negotiatedRpcVersion": 1 })))
        .await
        .is_ok()
}

fn handle_request(text: &str, shared: &Shared) -> Option<Message> {
    let value: Value = serde_json::from_str(text).ok()?;
    if value["op"] != 6 {
        return None;
    }
    shared.stats.requests.fetch_add(1, Ordering::SeqCst);

    let mut behavior = shared.behavior.lock().unwrap();
    if behavior.ignore_requests {
        return None;
    }

    let request_type = value["d"]["requestType"].as_str().unwrap_or_default().to_string();
    let request_id = value["d"]["requestId"].clone();

    let (status, data) = match request_type.as_str() {
        "ToggleRecord" if behavior.reject_toggle => (
            json!({ "result": false, "code": 501, "comment": "Output is not ready" }),
            Value::Null,
        ),
        "ToggleRecord" => {
            shared.stats.toggles.fetch_add(1, Ordering::SeqCst);
            behavior.recording = !behavior.recording;
            (
                json!({ "result": true, "code": 100 }),
                json!({ "outputActive": behavior.recording }),
            )
        }
        "GetRecordStatus" => (
            json!({ "result": true, "code": 100 }),
            json!({
                "outputActive": behavior.recording,
                "outputPaused": false,
                "outputTimecode": "00:00:00.000",
                "outputDuration": 0,
                "outputBytes": 0
            }),
        ),
        _ => (
            json!({ "result": false, "code": 204, "comment": "Unknown request type" }),
            Value::Null,
        ),
    };

    let mut d = json!({
        "requestType": request_type,
        "requestId": request_id,
        "requestStatus": status,
    });
    if !data.is_null() {
        d["responseData"] = data;
    }
    Some(frame(7, d))
}
