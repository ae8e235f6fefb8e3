//! Short/long press classification for one event code.
//!
//! The classifier is a two-state machine fed with raw [`InputEvent`]s in
//! arrival order:
//!
//! ```text
//!            DOWN (code)                UP (code)
//!   Idle ───────────────▶ Pressed ───────────────▶ Idle  ⇒ Short | Long
//!     ▲                      │
//!     └──── reset() ─────────┘   (device lost: press discarded, no action)
//! ```
//!
//! UP while idle and DOWN/REPEAT while pressed are ignored.

use std::time::{Duration, Instant};

use obs_remote_core::events::{Action, InputEvent, KeyState};

/// Hold duration at or above which a press counts as long.
pub const LONG_PRESS_THRESHOLD: Duration = Duration::from_secs(1);

/// Current phase of the press state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressPhase {
    Idle,
    Pressed { started_at: Instant },
}

#[derive(Debug, Clone)]
pub struct PressClassifier {
    code: u16,
    phase: PressPhase,
}

impl PressClassifier {
    pub fn new(code: u16) -> Self {
        Self {
            code,
            phase: PressPhase::Idle,
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn phase(&self) -> PressPhase {
        self.phase
    }

    pub fn is_pressed(&self) -> bool {
        matches!(self.phase, PressPhase::Pressed { .. })
    }

    /// Feed one event; returns an action when a press completes.
    pub fn classify(&mut self, event: &InputEvent) -> Option<Action> {
        if event.code != self.code {
            return None;
        }

        match (self.phase, event.state) {
            (PressPhase::Idle, KeyState::Down) => {
                self.phase = PressPhase::Pressed {
                    started_at: event.timestamp,
                };
                None
            }
            (PressPhase::Pressed { started_at }, KeyState::Up) => {
                self.phase = PressPhase::Idle;
                // Saturates to zero if the clock went backwards.
                let held = event.timestamp.saturating_duration_since(started_at);
                Some(classify_hold(held))
            }
            _ => None,
        }
    }

    /// Forget any in-flight press after the event stream ended.
    ///
    /// Returns `true` if a press was discarded.
    pub fn reset(&mut self) -> bool {
        let was_pressed = self.is_pressed();
        self.phase = PressPhase::Idle;
        was_pressed
    }
}

/// Map a completed hold duration to an action (threshold inclusive).
pub fn classify_hold(held: Duration) -> Action {
    if held >= LONG_PRESS_THRESHOLD {
        Action::LongPress
    } else {
        Action::ShortPress
    }
}
