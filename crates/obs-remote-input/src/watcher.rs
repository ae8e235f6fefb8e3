//! Device watcher: discovery, retry and classification loop.
//!
//! Owns the [`PressClassifier`] and at most one open [`EventSource`]. When the
//! source ends the in-flight press is discarded and discovery starts over, so
//! a button that is unplugged and replugged keeps working without a restart.

use std::time::Duration;

use obs_remote_core::events::Action;
use obs_remote_core::{Error, Shutdown};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::classifier::PressClassifier;
use crate::device::{DeviceDiscovery, EventSource};

/// Pause between discovery attempts while no device reports the code.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Why one device session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    DeviceLost,
    Shutdown,
    ReceiverClosed,
}

pub struct DeviceWatcher<D: DeviceDiscovery> {
    discovery: D,
    classifier: PressClassifier,
    retry_interval: Duration,
    /// Completed device sessions (open → stream end).
    sessions: u64,
}

impl<D: DeviceDiscovery> DeviceWatcher<D> {
    pub fn new(discovery: D, code: u16) -> Self {
        Self {
            discovery,
            classifier: PressClassifier::new(code),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            sessions: 0,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn code(&self) -> u16 {
        self.classifier.code()
    }

    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    pub fn classifier(&self) -> &PressClassifier {
        &self.classifier
    }

    /// Watch until shutdown or until nobody receives actions anymore.
    ///
    /// Actions are forwarded in the order their releases were read.
    pub async fn run(&mut self, action_tx: mpsc::Sender<Action>, mut shutdown: Shutdown) {
        let code = self.code();
        info!("Watching for event code {}", code);

        let mut reported_missing = false;
        loop {
            if shutdown.is_triggered() {
                break;
            }

            let found = tokio::select! {
                found = self.discovery.find_device_with_code(code) => found,
                _ = shutdown.wait() => break,
            };

            let Some(mut source) = found else {
                if reported_missing {
                    debug!("Still no device reporting code {}", code);
                } else {
                    warn!(
                        "{}, retrying every {:?}",
                        Error::DeviceUnavailable { code },
                        self.retry_interval
                    );
                    reported_missing = true;
                }
                tokio::select! {
                    _ = tokio::time::sleep(self.retry_interval) => {}
                    _ = shutdown.wait() => break,
                }
                continue;
            };
            reported_missing = false;

            let label = source.describe();
            info!("Using input device {}", label);

            let opened_at = Instant::now();
            let end = self.pump(&mut source, &action_tx, &mut shutdown).await;
            drop(source);
            self.sessions += 1;

            if self.classifier.reset() {
                info!("Press on {} discarded, device went away while held", label);
            }

            match end {
                SessionEnd::DeviceLost => {
                    warn!("Input device {} lost, rediscovering", label);
                    // A node that opens and fails straight away would
                    // otherwise be reopened in a tight loop.
                    let lived = opened_at.elapsed();
                    if lived < self.retry_interval {
                        debug!("{} lasted {:?}, pausing before rediscovery", label, lived);
                        tokio::select! {
                            _ = tokio::time::sleep(self.retry_interval - lived) => {}
                            _ = shutdown.wait() => break,
                        }
                    }
                }
                SessionEnd::Shutdown => break,
                SessionEnd::ReceiverClosed => {
                    debug!("Action receiver closed");
                    break;
                }
            }
        }

        debug!("Device watcher stopped after {} session(s)", self.sessions);
    }

    async fn pump<S: EventSource>(
        &mut self,
        source: &mut S,
        action_tx: &mpsc::Sender<Action>,
        shutdown: &mut Shutdown,
    ) -> SessionEnd {
        loop {
            let event = tokio::select! {
                event = source.next_event() => event,
                _ = shutdown.wait() => return SessionEnd::Shutdown,
            };
            let Some(event) = event else {
                return SessionEnd::DeviceLost;
            };
            trace!("Key event: code={} state={:?}", event.code, event.state);

            let Some(action) = self.classifier.classify(&event) else {
                continue;
            };
            info!("Detected {}", action);

            tokio::select! {
                sent = action_tx.send(action) => {
                    if sent.is_err() {
                        return SessionEnd::ReceiverClosed;
                    }
                }
                _ = shutdown.wait() => return SessionEnd::Shutdown,
            }
        }
    }
}
