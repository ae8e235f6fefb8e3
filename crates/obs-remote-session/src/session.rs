//! High-level remote control operations.
//!
//! [`ControlSession`] combines the websocket [`SessionClient`] with the local
//! [`TargetProcess`] collaborator and exposes the two operations the action
//! dispatcher needs. Every call returns a [`RemoteCommandResult`]; failures
//! are reported, never raised.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use obs_remote_core::events::RemoteCommandResult;
use obs_remote_core::prelude::*;

use crate::client::{ConnectionState, SessionClient, SessionConfig};
use crate::process::TargetProcess;

/// Remote control operations used by the action dispatcher.
#[trait_variant::make(RemoteControl: Send)]
pub trait LocalRemoteControl {
    /// Start recording if stopped, stop it if recording.
    async fn toggle_recording(&self) -> RemoteCommandResult;

    /// Launch the application if it is not running, otherwise ask it to quit.
    async fn toggle_application_lifecycle(&self) -> RemoteCommandResult;
}

/// Tuning for [`RemoteControl::toggle_application_lifecycle`].
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Refuse to quit OBS while it reports an active recording.
    pub protect_active_recording: bool,
    /// How long to wait for a connection when deciding whether OBS is up.
    pub probe_timeout: Duration,
    /// Delay between launching OBS and the next connection attempt.
    pub launch_grace: Duration,
    /// Minimum spacing between accepted lifecycle toggles. Zero disables it.
    pub toggle_cooldown: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            protect_active_recording: true,
            probe_timeout: Duration::from_millis(1500),
            launch_grace: Duration::from_secs(3),
            toggle_cooldown: Duration::from_secs(2),
        }
    }
}

pub struct ControlSession<P: TargetProcess> {
    client: SessionClient,
    process: P,
    lifecycle: LifecycleConfig,
    /// When the last accepted lifecycle toggle started.
    last_toggle: Mutex<Option<Instant>>,
}

impl<P: TargetProcess> ControlSession<P> {
    pub fn new(client: SessionClient, process: P, lifecycle: LifecycleConfig) -> Self {
        Self {
            client,
            process,
            lifecycle,
            last_toggle: Mutex::new(None),
        }
    }

    /// Spawn a session client for `config` and start connecting.
    pub fn connect(config: SessionConfig, process: P, lifecycle: LifecycleConfig) -> Self {
        Self::new(SessionClient::spawn(config), process, lifecycle)
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Close the websocket gracefully and stop the session task.
    pub async fn close(&self) {
        self.client.close().await;
    }

    /// Whether the endpoint answers, nudging a reconnect if it is down.
    async fn probe_reachable(&self) -> bool {
        if self.client.is_authenticated() {
            return true;
        }
        self.client.reconnect_now();
        self.client
            .wait_authenticated(self.lifecycle.probe_timeout)
            .await
    }

    /// Accept a lifecycle toggle unless the previous one is too recent.
    ///
    /// Rejected toggles do not restart the cooldown.
    fn begin_lifecycle_toggle(&self) -> Result<()> {
        let now = Instant::now();
        let mut last = self
            .last_toggle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = *last {
            let elapsed = now.saturating_duration_since(previous);
            if elapsed < self.lifecycle.toggle_cooldown {
                return Err(Error::Cooldown {
                    remaining: self.lifecycle.toggle_cooldown - elapsed,
                });
            }
        }
        *last = Some(now);
        Ok(())
    }

    async fn run_lifecycle_toggle(&self) -> Result<&'static str> {
        self.begin_lifecycle_toggle()?;

        let reachable = self.probe_reachable().await;
        let running = reachable || self.process.is_target_running().await;
        debug!("OBS reachable={} running={}", reachable, running);

        if !running {
            self.process.launch_target().await?;
            let client = self.client.clone();
            let grace = self.lifecycle.launch_grace;
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                client.reconnect_now();
            });
            return Ok("OBS launched");
        }

        if reachable && self.lifecycle.protect_active_recording {
            match self.client.record_status().await {
                Ok(true) => return Err(Error::RecordingActive),
                Ok(false) => {}
                Err(e) => warn!("Could not read recording status, closing anyway: {}", e),
            }
        }

        self.process.request_target_termination().await?;
        Ok("OBS asked to quit")
    }
}

impl<P: TargetProcess + Sync> RemoteControl for ControlSession<P> {
    async fn toggle_recording(&self) -> RemoteCommandResult {
        match self.client.toggle_record().await {
            Ok(()) => RemoteCommandResult::success_with("recording toggled"),
            Err(e) => RemoteCommandResult::from(&e),
        }
    }

    async fn toggle_application_lifecycle(&self) -> RemoteCommandResult {
        match self.run_lifecycle_toggle().await {
            Ok(message) => RemoteCommandResult::success_with(message),
            Err(e) => RemoteCommandResult::from(&e),
        }
    }
}
