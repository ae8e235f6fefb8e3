//! Task orchestration
//!
//! Three independent tasks run until shutdown:
//!
//! 1. the device watcher, producing actions;
//! 2. the session client task (spawned by the control session), which owns
//!    the websocket and its backoff timers;
//! 3. the dispatch loop, consuming actions one at a time.
//!
//! Actions travel over a bounded channel, so arrival order is dispatch order.

use std::sync::Arc;
use std::time::Duration;

use obs_remote_core::prelude::*;
use obs_remote_core::{shutdown, Shutdown};
use obs_remote_input::{DeviceDiscovery, DeviceWatcher};
use obs_remote_session::{ControlSession, RemoteControl, TargetProcess};
use tokio::sync::mpsc;

use crate::config::RunConfig;
use crate::dispatcher::ActionDispatcher;
use crate::signals;

/// Pending actions held while a command is in progress
pub const ACTION_QUEUE_CAPACITY: usize = 32;

/// Upper bound on the graceful websocket close at shutdown
pub const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// What happened during one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Device read sessions, one per discovered device
    pub device_sessions: u64,
    /// Actions whose command completed
    pub actions_dispatched: u64,
}

/// Run obs-remote until SIGINT/SIGTERM.
#[cfg(target_os = "linux")]
pub async fn run(config: RunConfig) -> Result<()> {
    use obs_remote_input::EvdevDiscovery;

    let (trigger, shutdown) = shutdown::channel();
    let signal_task = signals::spawn_signal_handler(trigger);

    info!(
        "Watching code {} and controlling OBS at {} (commands: {})",
        config.code,
        config.session.url(),
        config.session.mode
    );

    let discovery = match &config.device_path {
        Some(path) => EvdevDiscovery::pinned(path.clone()),
        None => EvdevDiscovery::new(),
    };
    let watcher = DeviceWatcher::new(discovery, config.code).with_retry_interval(config.device_retry);
    let control = Arc::new(ControlSession::connect(
        config.session,
        config.process,
        config.lifecycle,
    ));

    let summary = run_tasks(watcher, Arc::clone(&control), shutdown).await;
    close_session(&control).await;
    signal_task.abort();

    info!(
        "obs-remote stopped ({} device session(s), {} action(s) dispatched)",
        summary.device_sessions, summary.actions_dispatched
    );
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub async fn run(_config: RunConfig) -> Result<()> {
    Err(Error::config("input devices are only supported on Linux (evdev)"))
}

/// Run the watcher and the dispatch loop until both have stopped.
///
/// Both stop on `shutdown`; the dispatcher also stops once the watcher is
/// gone and the queue is drained.
pub async fn run_tasks<D, R>(
    watcher: DeviceWatcher<D>,
    control: Arc<R>,
    shutdown: Shutdown,
) -> RunSummary
where
    D: DeviceDiscovery + 'static,
    R: RemoteControl + Sync + 'static,
{
    let (action_tx, action_rx) = mpsc::channel(ACTION_QUEUE_CAPACITY);

    let watcher_task = tokio::spawn({
        let shutdown = shutdown.clone();
        let mut watcher = watcher;
        async move {
            watcher.run(action_tx, shutdown).await;
            watcher.sessions()
        }
    });

    let dispatch_task = tokio::spawn(async move {
        let mut dispatcher = ActionDispatcher::new(control);
        dispatcher.run(action_rx, shutdown).await;
        dispatcher.dispatched()
    });

    let (sessions, dispatched) = tokio::join!(watcher_task, dispatch_task);
    RunSummary {
        device_sessions: sessions.unwrap_or_else(|e| {
            error!("Device watcher task failed: {}", e);
            0
        }),
        actions_dispatched: dispatched.unwrap_or_else(|e| {
            error!("Dispatcher task failed: {}", e);
            0
        }),
    }
}

/// Close the websocket, giving up after [`SESSION_CLOSE_TIMEOUT`].
pub async fn close_session<P: TargetProcess>(control: &ControlSession<P>) {
    match tokio::time::timeout(SESSION_CLOSE_TIMEOUT, control.close()).await {
        Ok(()) => debug!("OBS session closed"),
        Err(_) => warn!(
            "OBS session did not close within {:?}, exiting anyway",
            SESSION_CLOSE_TIMEOUT
        ),
    }
}
