//! # obs-remote-session - OBS Remote Control
//!
//! Maintains an authenticated obs-websocket v5 connection and exposes the
//! high-level commands obs-remote needs.
//!
//! ## Public API
//!
//! ### Protocol (`protocol`)
//! - [`parse_server_message`] / [`ServerMessage`] - Typed server frames
//! - [`auth_response`] - Password credential for the Identify handshake
//! - [`RequestTracker`] - Correlates requests with their responses
//!
//! ### Session Client (`client`)
//! - [`SessionClient`] - Auto-reconnecting connection handle
//! - [`SessionConfig`] / [`CommandMode`] - Endpoint, credential and timing
//! - [`ConnectionState`] / [`ConnectionPhase`] - Published connection snapshot
//!
//! ### Control Session (`session`)
//! - [`RemoteControl`] - toggle recording / toggle application lifecycle
//! - [`ControlSession`] - `RemoteControl` over a client and a process
//!
//! ### Process (`process`)
//! - [`TargetProcess`] - Detect, launch and terminate the OBS process
//! - [`ObsProcess`] - `/proc` scan, detached spawn and SIGINT

pub mod client;
pub mod process;
pub mod protocol;
pub mod session;

pub use client::{
    compute_backoff, CommandMode, ConnectionPhase, ConnectionState, SessionClient, SessionConfig,
};
pub use process::{LocalTargetProcess, ObsProcess, TargetProcess};
pub use protocol::{auth_response, parse_server_message, RequestTracker, ServerMessage};
pub use session::{ControlSession, LifecycleConfig, LocalRemoteControl, RemoteControl};
