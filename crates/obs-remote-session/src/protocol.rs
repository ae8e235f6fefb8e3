//! obs-websocket v5 protocol types.
//!
//! Every frame is a JSON text message `{"op": <opcode>, "d": {...}}`. This
//! module defines the messages obs-remote exchanges, the authentication
//! credential computation, and a request tracker for correlating
//! `RequestResponse` frames with their originating requests.
//!
//! Protocol reference:
//! <https://github.com/obsproject/obs-websocket/blob/master/docs/generated/protocol.md>

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;

use obs_remote_core::prelude::*;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Message opcodes.
pub mod op {
    pub const HELLO: u8 = 0;
    pub const IDENTIFY: u8 = 1;
    pub const IDENTIFIED: u8 = 2;
    pub const EVENT: u8 = 5;
    pub const REQUEST: u8 = 6;
    pub const REQUEST_RESPONSE: u8 = 7;
}

/// RPC version requested in `Identify`.
pub const RPC_VERSION: u32 = 1;

/// `EventSubscription::General`, which carries `ExitStarted`.
pub const EVENT_SUBSCRIPTION_GENERAL: u32 = 1;

/// Server close code: the credential did not match.
pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4009;

/// Server close code: the requested RPC version is not supported.
pub const CLOSE_UNSUPPORTED_RPC_VERSION: u16 = 4010;

/// Request types used by obs-remote.
pub mod request_type {
    pub const TOGGLE_RECORD: &str = "ToggleRecord";
    pub const GET_RECORD_STATUS: &str = "GetRecordStatus";
}

// ---------------------------------------------------------------------------
// Server → client messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IncomingEnvelope {
    op: u8,
    d: Value,
}

/// First message after the WebSocket upgrade.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub obs_web_socket_version: Option<String>,
    pub rpc_version: u32,
    /// Present only when the server requires a password.
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

/// Handshake completed; requests may now be sent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

/// Unsolicited server event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObsEvent {
    pub event_type: String,
    pub event_intent: Option<u32>,
    pub event_data: Option<Value>,
}

/// Answer to one of our requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    pub response_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u32,
    pub comment: Option<String>,
}

/// The result of parsing a raw text frame.
#[derive(Debug)]
pub enum ServerMessage {
    Hello(Hello),
    Identified(Identified),
    Event(ObsEvent),
    RequestResponse(RequestResponse),
    /// Anything we could not interpret, kept raw for logging.
    Unknown(String),
}

/// Parse a raw WebSocket text frame into a [`ServerMessage`].
///
/// Never fails: invalid JSON, unknown opcodes and payloads that do not match
/// their opcode all become [`ServerMessage::Unknown`].
pub fn parse_server_message(text: &str) -> ServerMessage {
    let envelope: IncomingEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(_) => return ServerMessage::Unknown(text.to_string()),
    };

    let parsed = match envelope.op {
        op::HELLO => serde_json::from_value(envelope.d).map(ServerMessage::Hello),
        op::IDENTIFIED => serde_json::from_value(envelope.d).map(ServerMessage::Identified),
        op::EVENT => serde_json::from_value(envelope.d).map(ServerMessage::Event),
        op::REQUEST_RESPONSE => {
            serde_json::from_value(envelope.d).map(ServerMessage::RequestResponse)
        }
        _ => return ServerMessage::Unknown(text.to_string()),
    };

    parsed.unwrap_or_else(|_| ServerMessage::Unknown(text.to_string()))
}

// ---------------------------------------------------------------------------
// Client → server messages
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct OutgoingEnvelope<'a, T: Serialize> {
    op: u8,
    d: &'a T,
}

/// Handshake reply to [`Hello`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    pub event_subscriptions: u32,
}

impl Identify {
    /// Build the reply to `hello`, answering its challenge if it has one.
    pub fn for_hello(hello: &Hello, password: &str) -> Self {
        let authentication = hello
            .authentication
            .as_ref()
            .map(|auth| auth_response(password, &auth.salt, &auth.challenge));
        Self {
            rpc_version: RPC_VERSION,
            authentication,
            event_subscriptions: EVENT_SUBSCRIPTION_GENERAL,
        }
    }

    pub fn to_frame(&self) -> Result<String> {
        encode(op::IDENTIFY, self)
    }
}

/// A single request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_type: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
}

impl Request {
    pub fn new(request_id: String, request_type: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            request_type: request_type.into(),
            request_id,
            request_data: data,
        }
    }

    pub fn to_frame(&self) -> Result<String> {
        encode(op::REQUEST, self)
    }
}

fn encode<T: Serialize>(op: u8, d: &T) -> Result<String> {
    Ok(serde_json::to_string(&OutgoingEnvelope { op, d })?)
}

/// Compute the `Identify.authentication` credential:
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`.
pub fn auth_response(password: &str, salt: &str, challenge: &str) -> String {
    let secret = BASE64.encode(Sha256::digest(format!("{password}{salt}").as_bytes()));
    BASE64.encode(Sha256::digest(format!("{secret}{challenge}").as_bytes()))
}

// ---------------------------------------------------------------------------
// Result mapping
// ---------------------------------------------------------------------------

/// Convert a response into the caller-facing result.
///
/// A failed `requestStatus` becomes [`Error::RequestRejected`]; otherwise the
/// (possibly absent) `responseData` is returned.
pub fn response_to_result(response: RequestResponse) -> Result<Option<Value>> {
    if response.request_status.result {
        Ok(response.response_data)
    } else {
        Err(Error::RequestRejected {
            request_type: response.request_type,
            code: response.request_status.code,
            comment: response.request_status.comment.unwrap_or_default(),
        })
    }
}

/// Map a server Close frame to the error recorded for the connection.
pub fn close_code_to_error(code: u16, reason: &str) -> Error {
    match code {
        CLOSE_AUTHENTICATION_FAILED => Error::auth_rejected(if reason.is_empty() {
            "authentication failed"
        } else {
            reason
        }),
        CLOSE_UNSUPPORTED_RPC_VERSION => {
            Error::protocol(format!("unsupported RPC version ({reason})"))
        }
        _ => Error::transport(format!("server closed the connection ({code}: {reason})")),
    }
}

// ---------------------------------------------------------------------------
// Request tracker
// ---------------------------------------------------------------------------

/// Process-wide counter for request IDs.
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> String {
    format!(
        "obs-remote-{}",
        REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

struct PendingRequest {
    request_type: String,
    response_tx: oneshot::Sender<RequestResponse>,
    created_at: Instant,
}

/// Tracks in-flight requests and matches them to responses.
///
/// Dropping an entry drops its sender, so the waiting caller observes a
/// closed channel; the client maps that to a transport failure.
#[derive(Default)]
pub struct RequestTracker {
    pending: HashMap<String, PendingRequest>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh request ID and register a pending slot for it.
    pub fn register(
        &mut self,
        request_type: impl Into<String>,
    ) -> (String, oneshot::Receiver<RequestResponse>) {
        let id = next_request_id();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id.clone(),
            PendingRequest {
                request_type: request_type.into(),
                response_tx: tx,
                created_at: Instant::now(),
            },
        );
        (id, rx)
    }

    /// Deliver a response to its waiting caller.
    ///
    /// Returns `false` if no request with `id` is pending.
    pub fn complete(&mut self, id: &str, response: RequestResponse) -> bool {
        match self.pending.remove(id) {
            Some(pending) => {
                let _ = pending.response_tx.send(response);
                true
            }
            None => false,
        }
    }

    /// Forget a request whose send failed.
    pub fn cancel(&mut self, id: &str) {
        self.pending.remove(id);
    }

    /// Drop every pending request, e.g. when the connection is lost.
    ///
    /// Returns the request types that were abandoned.
    pub fn fail_all(&mut self) -> Vec<String> {
        self.pending
            .drain()
            .map(|(_, pending)| pending.request_type)
            .collect()
    }

    /// Remove requests pending longer than `timeout`, returning their IDs.
    pub fn cleanup_stale(&mut self, timeout: Duration) -> Vec<String> {
        let now = Instant::now();
        let stale: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, req)| now.duration_since(req.created_at) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            self.pending.remove(id);
        }
        stale
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
