//! `ControlSession` against a live mock server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use obs_remote_core::{ErrorKind, Result};
use obs_remote_session::{ControlSession, LifecycleConfig, RemoteControl, TargetProcess};

use super::mock_obs::{MockBehavior, MockObs};

const WAIT: Duration = Duration::from_secs(3);

/// Process stand-in that always reports OBS as running.
#[derive(Default)]
struct RunningObs {
    quit_requested: AtomicBool,
    terminations: AtomicUsize,
}

impl TargetProcess for RunningObs {
    async fn is_target_running(&self) -> bool {
        !self.quit_requested.load(Ordering::SeqCst)
    }

    async fn launch_target(&self) -> Result<()> {
        self.quit_requested.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn request_target_termination(&self) -> Result<()> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        self.quit_requested.store(true, Ordering::SeqCst);
        Ok(())
    }
}

async fn connected_session(
    server: &MockObs,
    lifecycle: LifecycleConfig,
) -> ControlSession<RunningObs> {
    let session = ControlSession::connect(
        server.session_config(""),
        RunningObs::default(),
        lifecycle,
    );
    assert!(session.client().wait_authenticated(WAIT).await);
    session
}

#[tokio::test]
async fn test_toggle_recording_round_trip() {
    let server = MockObs::start(MockBehavior::default()).await;
    let session = connected_session(&server, LifecycleConfig::default()).await;

    let result = session.toggle_recording().await;
    assert!(result.ok, "{:?}", result);
    assert!(server.recording());

    let result = session.toggle_recording().await;
    assert!(result.ok);
    assert!(!server.recording());
    assert_eq!(server.toggles(), 2);
    session.close().await;
}

#[tokio::test]
async fn test_refuses_to_quit_while_recording() {
    let server = MockObs::start(MockBehavior {
        recording: true,
        ..MockBehavior::default()
    })
    .await;
    let session = connected_session(&server, LifecycleConfig::default()).await;

    let result = session.toggle_application_lifecycle().await;
    assert!(!result.ok);
    assert_eq!(result.error, Some(ErrorKind::RecordingActive));
    assert_eq!(session.process().terminations.load(Ordering::SeqCst), 0);
    session.close().await;
}

#[tokio::test]
async fn test_quits_when_not_recording() {
    let server = MockObs::start(MockBehavior::default()).await;
    let session = connected_session(&server, LifecycleConfig::default()).await;

    let result = session.toggle_application_lifecycle().await;
    assert!(result.ok, "{:?}", result);
    assert_eq!(result.message.as_deref(), Some("OBS asked to quit"));
    assert_eq!(session.process().terminations.load(Ordering::SeqCst), 1);
    session.close().await;
}

#[tokio::test]
async fn test_quits_while_recording_when_unprotected() {
    let server = MockObs::start(MockBehavior {
        recording: true,
        ..MockBehavior::default()
    })
    .await;
    let lifecycle = LifecycleConfig {
        protect_active_recording: false,
        ..LifecycleConfig::default()
    };
    let session = connected_session(&server, lifecycle).await;

    let result = session.toggle_application_lifecycle().await;
    assert!(result.ok, "{:?}", result);
    assert_eq!(session.process().terminations.load(Ordering::SeqCst), 1);
    // Only the toggle path queries status; nothing was toggled here.
    assert_eq!(server.toggles(), 0);
    session.close().await;
}

#[tokio::test]
async fn test_toggle_rejected_by_server_is_reported() {
    let server = MockObs::start(MockBehavior {
        reject_toggle: true,
        ..MockBehavior::default()
    })
    .await;
    let session = connected_session(&server, LifecycleConfig::default()).await;

    let result = session.toggle_recording().await;
    assert!(!result.ok);
    assert_eq!(result.error, Some(ErrorKind::RequestRejected));
    assert!(!server.recording());
    session.close().await;
}
