//! Application error types with rich context

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
///
/// This is what crosses component boundaries: the session records the kind of
/// its last failure in its connection state, and per-call results report a
/// kind rather than the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input device not found or lost.
    DeviceUnavailable,
    /// The remote endpoint refused the supplied credential.
    AuthRejected,
    /// Network-level failure (connect, read, write, keepalive).
    TransportFailure,
    /// A request was sent but never acknowledged within its wait bound.
    CommandTimeout,
    /// No authenticated connection became available within the wait bound.
    Unavailable,
    /// The remote endpoint answered the request with a failure status.
    RequestRejected,
    /// Malformed or unexpected protocol traffic.
    Protocol,
    /// The target application could not be launched or signalled.
    LaunchFailed,
    /// Refused to terminate the target while it is recording.
    RecordingActive,
    /// A lifecycle toggle arrived too soon after the previous one.
    Cooldown,
    /// Invalid configuration.
    Config,
    /// Everything else (I/O, channels, serialization).
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::DeviceUnavailable => "device unavailable",
            ErrorKind::AuthRejected => "authentication rejected",
            ErrorKind::TransportFailure => "transport failure",
            ErrorKind::CommandTimeout => "command timeout",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::RequestRejected => "request rejected",
            ErrorKind::Protocol => "protocol error",
            ErrorKind::LaunchFailed => "launch failed",
            ErrorKind::RecordingActive => "recording active",
            ErrorKind::Cooldown => "cooldown",
            ErrorKind::Config => "configuration error",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(name)
    }
}

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Input Device Errors
    // ─────────────────────────────────────────────────────────────
    #[error("No input device exposes event code {code}")]
    DeviceUnavailable { code: u16 },

    // ─────────────────────────────────────────────────────────────
    // Remote Session Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Authentication rejected: {reason}")]
    AuthRejected { reason: String },

    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Request {request_type} was not acknowledged within {waited:?}")]
    CommandTimeout {
        request_type: String,
        waited: Duration,
    },

    #[error("Remote endpoint unavailable after waiting {waited:?}")]
    Unavailable { waited: Duration },

    #[error("Request {request_type} failed with status {code}: {comment}")]
    RequestRejected {
        request_type: String,
        code: u32,
        comment: String,
    },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // ─────────────────────────────────────────────────────────────
    // Target Process Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Target process error: {message}")]
    Process { message: String },

    #[error("Failed to launch target: {reason}")]
    ProcessSpawn { reason: String },

    #[error("Refusing to close the target while a recording is active")]
    RecordingActive,

    #[error("Lifecycle toggle ignored, cooling down for another {remaining:?}")]
    Cooldown { remaining: Duration },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn auth_rejected(reason: impl Into<String>) -> Self {
        Self::AuthRejected {
            reason: reason.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Map this error onto its [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DeviceUnavailable { .. } => ErrorKind::DeviceUnavailable,
            Error::AuthRejected { .. } => ErrorKind::AuthRejected,
            Error::Transport { .. } => ErrorKind::TransportFailure,
            Error::CommandTimeout { .. } => ErrorKind::CommandTimeout,
            Error::Unavailable { .. } => ErrorKind::Unavailable,
            Error::RequestRejected { .. } => ErrorKind::RequestRejected,
            Error::Protocol { .. } => ErrorKind::Protocol,
            Error::Process { .. } | Error::ProcessSpawn { .. } => ErrorKind::LaunchFailed,
            Error::RecordingActive => ErrorKind::RecordingActive,
            Error::Cooldown { .. } => ErrorKind::Cooldown,
            Error::Config { .. } | Error::ConfigNotFound { .. } | Error::ConfigInvalid { .. } => {
                ErrorKind::Config
            }
            Error::Io(_) | Error::Json(_) | Error::ChannelClosed => ErrorKind::Internal,
        }
    }

    /// Check if this is a recoverable error
    ///
    /// Device and connection failures are retried locally and never end the
    /// process.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DeviceUnavailable { .. }
                | Error::AuthRejected { .. }
                | Error::Transport { .. }
                | Error::CommandTimeout { .. }
                | Error::Unavailable { .. }
                | Error::RequestRejected { .. }
                | Error::Protocol { .. }
                | Error::RecordingActive
                | Error::Cooldown { .. }
        )
    }

    /// Check if this error should trigger application exit
    ///
    /// Only startup misconfiguration is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config { .. } | Error::ConfigNotFound { .. } | Error::ConfigInvalid { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
