//! Event and result types passed between the watcher, classifier, dispatcher
//! and session.

use std::fmt;
use std::time::Instant;

use crate::error::{Error, ErrorKind};

/// Key transition reported by the input subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Down,
    Up,
    /// Autorepeat while the key is held.
    Repeat,
}

impl KeyState {
    /// Map a raw EV_KEY value (`0` up, `1` down, `2` repeat).
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyState::Up),
            1 => Some(KeyState::Down),
            2 => Some(KeyState::Repeat),
            _ => None,
        }
    }
}

/// A single key event read from the watched device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// Event code of the key/button (input subsystem numbering).
    pub code: u16,
    pub state: KeyState,
    /// Monotonic time at which the event was read.
    pub timestamp: Instant,
}

impl InputEvent {
    pub fn new(code: u16, state: KeyState, timestamp: Instant) -> Self {
        Self {
            code,
            state,
            timestamp,
        }
    }
}

/// Outcome of classifying one complete press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ShortPress,
    LongPress,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ShortPress => f.write_str("short press"),
            Action::LongPress => f.write_str("long press"),
        }
    }
}

/// Result of one remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommandResult {
    pub ok: bool,
    pub error: Option<ErrorKind>,
    pub message: Option<String>,
}

impl RemoteCommandResult {
    pub fn success() -> Self {
        Self {
            ok: true,
            error: None,
            message: None,
        }
    }

    pub fn success_with(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            error: None,
            message: Some(message.into()),
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(kind),
            message: Some(message.into()),
        }
    }
}

impl From<&Error> for RemoteCommandResult {
    fn from(err: &Error) -> Self {
        RemoteCommandResult::failure(err.kind(), err.to_string())
    }
}

impl From<Error> for RemoteCommandResult {
    fn from(err: Error) -> Self {
        RemoteCommandResult::from(&err)
    }
}
