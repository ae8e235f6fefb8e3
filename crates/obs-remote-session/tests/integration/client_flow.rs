//! Connection lifecycle and command flows of `SessionClient`.

use std::time::Duration;

use obs_remote_core::{Error, ErrorKind};
use obs_remote_session::{CommandMode, ConnectionPhase, SessionClient};

use super::mock_obs::{MockBehavior, MockObs};

const WAIT: Duration = Duration::from_secs(3);

// ─────────────────────────────────────────────────────────
// Handshake
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_authenticates_and_toggles_recording() {
    let server = MockObs::start(MockBehavior::with_password("supersecret")).await;
    let client = SessionClient::spawn(server.session_config("supersecret"));

    assert!(client.wait_authenticated(WAIT).await);
    assert_eq!(client.state().retry_count(), 0);

    client.toggle_record().await.unwrap();
    assert_eq!(server.toggles(), 1);
    assert!(server.recording());
    assert!(client.record_status().await.unwrap());

    client.toggle_record().await.unwrap();
    assert!(!client.record_status().await.unwrap());

    client.close().await;
}

#[tokio::test]
async fn test_no_password_required() {
    let server = MockObs::start(MockBehavior::default()).await;
    let client = SessionClient::spawn(server.session_config(""));

    assert!(client.wait_authenticated(WAIT).await);
    client.toggle_record().await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn test_wrong_password_stays_disconnected_and_recovers() {
    let server = MockObs::start(MockBehavior::with_password("supersecret")).await;
    let client = SessionClient::spawn(server.session_config("wrong"));

    let mut states = client.subscribe();
    let rejected = tokio::time::timeout(WAIT, states.wait_for(|s| s.retry_count() >= 2))
        .await
        .expect("retry count should grow")
        .unwrap()
        .clone();
    assert_eq!(rejected.last_error(), Some(ErrorKind::AuthRejected));
    assert_ne!(rejected.phase(), ConnectionPhase::Authenticated);
    assert_eq!(server.identified(), 0);

    // Operator fixes the server side; the next attempt succeeds.
    server.update(|b| b.password = Some("wrong".to_string()));
    client.reconnect_now();
    assert!(client.wait_authenticated(WAIT).await);

    let state = client.state();
    assert_eq!(state.retry_count(), 0);
    assert!(state.last_error().is_none());
    client.close().await;
}

// ─────────────────────────────────────────────────────────
// Reconnection
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconnects_after_connection_drop() {
    let server = MockObs::start(MockBehavior::default()).await;
    let client = SessionClient::spawn(server.session_config(""));
    assert!(client.wait_authenticated(WAIT).await);

    let mut states = client.subscribe();
    server.drop_connections();

    let lost = tokio::time::timeout(WAIT, states.wait_for(|s| !s.is_authenticated()))
        .await
        .expect("drop should be noticed")
        .unwrap()
        .clone();
    assert_eq!(lost.last_error(), Some(ErrorKind::TransportFailure));

    assert!(client.wait_authenticated(WAIT).await);
    assert!(server.connections() >= 2);
    assert!(server.identified() >= 2);
    client.toggle_record().await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn test_keepalive_detects_stalled_server() {
    let server = MockObs::start(MockBehavior {
        stall: true,
        ..MockBehavior::default()
    })
    .await;
    let mut config = server.session_config("");
    config.keepalive_interval = Duration::from_millis(100);
    let client = SessionClient::spawn(config);
    assert!(client.wait_authenticated(WAIT).await);

    let mut states = client.subscribe();
    let lost = tokio::time::timeout(WAIT, states.wait_for(|s| !s.is_authenticated()))
        .await
        .expect("keepalive should declare the connection dead")
        .unwrap()
        .clone();
    assert_eq!(lost.last_error(), Some(ErrorKind::TransportFailure));
    client.close().await;
}

// ─────────────────────────────────────────────────────────
// Command failures
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_command_while_server_down_is_unavailable() {
    let server = MockObs::start(MockBehavior::default()).await;
    let mut config = server.session_config("");
    config.command_timeout = Duration::from_millis(300);
    let client = SessionClient::spawn(config);
    assert!(client.wait_authenticated(WAIT).await);

    server.shutdown();
    let mut states = client.subscribe();
    tokio::time::timeout(WAIT, states.wait_for(|s| !s.is_authenticated()))
        .await
        .expect("shutdown should be noticed")
        .unwrap();

    match client.toggle_record().await.unwrap_err() {
        Error::Unavailable { waited } => assert_eq!(waited, Duration::from_millis(300)),
        other => panic!("Expected Unavailable, got {:?}", other),
    }
    client.close().await;
}

#[tokio::test]
async fn test_fail_fast_mode_does_not_wait() {
    let server = MockObs::start(MockBehavior::default()).await;
    let mut config = server.session_config("");
    config.mode = CommandMode::FailFast;
    server.shutdown();

    let client = SessionClient::spawn(config);
    let err = client.toggle_record().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    client.close().await;
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    let server = MockObs::start(MockBehavior {
        ignore_requests: true,
        ..MockBehavior::default()
    })
    .await;
    let mut config = server.session_config("");
    config.command_timeout = Duration::from_millis(200);
    let client = SessionClient::spawn(config);
    assert!(client.wait_authenticated(WAIT).await);

    let err = client.toggle_record().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommandTimeout);
    assert_eq!(server.requests(), 1);
    // The session itself is still healthy.
    assert!(client.is_authenticated());
    client.close().await;
}

#[tokio::test]
async fn test_connection_lost_mid_request_is_transport_failure() {
    let server = MockObs::start(MockBehavior {
        ignore_requests: true,
        ..MockBehavior::default()
    })
    .await;
    let mut config = server.session_config("");
    config.command_timeout = Duration::from_secs(5);
    let client = SessionClient::spawn(config);
    assert!(client.wait_authenticated(WAIT).await);

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.toggle_record().await })
    };
    assert!(server.wait_until(WAIT, |s| s.requests() == 1).await);
    server.drop_connections();

    let err = tokio::time::timeout(WAIT, pending)
        .await
        .expect("request should fail once the connection drops")
        .unwrap()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    client.close().await;
}

#[tokio::test]
async fn test_rejected_request_reports_status() {
    let server = MockObs::start(MockBehavior {
        reject_toggle: true,
        ..MockBehavior::default()
    })
    .await;
    let client = SessionClient::spawn(server.session_config(""));
    assert!(client.wait_authenticated(WAIT).await);

    match client.toggle_record().await.unwrap_err() {
        Error::RequestRejected { code, comment, .. } => {
            assert_eq!(code, 501);
            assert_eq!(comment, "Output is not ready");
        }
        other => panic!("Expected RequestRejected, got {:?}", other),
    }
    client.close().await;
}

// ─────────────────────────────────────────────────────────
// Shutdown
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_close_sends_close_frame() {
    let server = MockObs::start(MockBehavior::default()).await;
    let client = SessionClient::spawn(server.session_config(""));
    assert!(client.wait_authenticated(WAIT).await);

    tokio::time::timeout(Duration::from_secs(2), client.close())
        .await
        .expect("close should complete");
    assert!(server.wait_until(WAIT, |s| s.client_closes() == 1).await);
    assert_eq!(client.state().phase(), ConnectionPhase::Disconnected);
}
