//! Action dispatch
//!
//! Maps each classified press onto exactly one remote command. The
//! dispatcher keeps no state between actions; a failed command is logged and
//! the loop moves on to the next action.

use std::sync::Arc;

use obs_remote_core::prelude::*;
use obs_remote_core::{Action, RemoteCommandResult, Shutdown};
use obs_remote_session::RemoteControl;
use tokio::sync::mpsc;

pub struct ActionDispatcher<R> {
    control: Arc<R>,
    dispatched: u64,
}

impl<R: RemoteControl + Sync> ActionDispatcher<R> {
    pub fn new(control: Arc<R>) -> Self {
        Self {
            control,
            dispatched: 0,
        }
    }

    /// Number of actions whose command ran to completion.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Run the command for one action and report its outcome.
    pub async fn dispatch(&self, action: Action) -> RemoteCommandResult {
        let result = match action {
            Action::ShortPress => self.control.toggle_recording().await,
            Action::LongPress => self.control.toggle_application_lifecycle().await,
        };

        let detail = result.message.as_deref().unwrap_or("done");
        if result.ok {
            info!("{}: {}", action, detail);
        } else {
            warn!(
                "{} failed ({:?}): {}",
                action,
                result.error.unwrap_or(ErrorKind::Internal),
                detail
            );
        }
        result
    }

    /// Dispatch actions one at a time, in arrival order, until the channel
    /// closes or shutdown is requested. A command still running at shutdown
    /// is abandoned.
    pub async fn run(&mut self, mut action_rx: mpsc::Receiver<Action>, mut shutdown: Shutdown) {
        loop {
            let action = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                action = action_rx.recv() => match action {
                    Some(action) => action,
                    None => {
                        debug!("Action channel closed");
                        break;
                    }
                },
            };

            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!("Shutdown requested, abandoning {}", action);
                    break;
                }
                _ = self.dispatch(action) => {
                    self.dispatched += 1;
                }
            }
        }
        debug!("Dispatcher stopped after {} actions", self.dispatched);
    }
}
