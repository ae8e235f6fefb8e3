//! Event sources and device discovery.
//!
//! The watcher only sees the two traits here. The evdev-backed
//! implementations are Linux-only; other platforms have no backend.

use std::future::Future;

use obs_remote_core::events::InputEvent;

/// A stream of key events from one opened device.
///
/// `None` from [`next_event`](LocalEventSource::next_event) means the source
/// is exhausted (device removed or read error). An exhausted source is never
/// read again.
#[trait_variant::make(EventSource: Send)]
pub trait LocalEventSource {
    async fn next_event(&mut self) -> Option<InputEvent>;

    /// Human-readable label for logs.
    fn describe(&self) -> String;
}

/// Locates a device that can emit a given event code.
pub trait DeviceDiscovery: Send + Sync {
    type Source: EventSource;

    /// Return an opened source for the first device supporting `code`.
    fn find_device_with_code(&self, code: u16)
        -> impl Future<Output = Option<Self::Source>> + Send;
}

#[cfg(target_os = "linux")]
pub use evdev_backend::{EvdevDiscovery, EvdevSource};

#[cfg(target_os = "linux")]
mod evdev_backend {
    use std::path::{Path, PathBuf};
    use std::time::{Instant, SystemTime};

    use evdev::{Device, InputEventKind, Key};
    use obs_remote_core::events::{InputEvent, KeyState};
    use tracing::{debug, trace, warn};

    use super::{DeviceDiscovery, EventSource};

    /// Scans `/dev/input/event*` through the evdev crate.
    #[derive(Debug, Clone, Default)]
    pub struct EvdevDiscovery {
        device_path: Option<PathBuf>,
    }

    impl EvdevDiscovery {
        pub fn new() -> Self {
            Self::default()
        }

        /// Only ever consider the node at `path`.
        pub fn pinned(path: impl Into<PathBuf>) -> Self {
            Self {
                device_path: Some(path.into()),
            }
        }

        pub fn device_path(&self) -> Option<&Path> {
            self.device_path.as_deref()
        }
    }

    fn supports_code(device: &Device, code: u16) -> bool {
        device
            .supported_keys()
            .is_some_and(|keys| keys.contains(Key::new(code)))
    }

    fn label(path: &Path, device: &Device) -> String {
        format!(
            "{} ({})",
            device.name().unwrap_or("unnamed device"),
            path.display()
        )
    }

    fn scan(device_path: Option<PathBuf>, code: u16) -> Option<(String, Device)> {
        if let Some(path) = device_path {
            return match Device::open(&path) {
                Ok(device) if supports_code(&device, code) => Some((label(&path, &device), device)),
                Ok(_) => {
                    debug!("{} does not report code {}", path.display(), code);
                    None
                }
                Err(e) => {
                    debug!("Cannot open {}: {}", path.display(), e);
                    None
                }
            };
        }

        evdev::enumerate()
            .find(|(_, device)| supports_code(device, code))
            .map(|(path, device)| (label(&path, &device), device))
    }

    impl DeviceDiscovery for EvdevDiscovery {
        type Source = EvdevSource;

        async fn find_device_with_code(&self, code: u16) -> Option<EvdevSource> {
            let device_path = self.device_path.clone();
            let found = match tokio::task::spawn_blocking(move || scan(device_path, code)).await {
                Ok(found) => found,
                Err(e) => {
                    warn!("Device scan task failed: {}", e);
                    return None;
                }
            };

            let (label, device) = found?;
            match device.into_event_stream() {
                Ok(stream) => Some(EvdevSource {
                    label,
                    stream: Some(stream),
                }),
                Err(e) => {
                    warn!("Cannot read from {}: {}", label, e);
                    None
                }
            }
        }
    }

    /// Key events from one evdev node.
    pub struct EvdevSource {
        label: String,
        /// `None` once the device has failed.
        stream: Option<evdev::EventStream>,
    }

    impl EventSource for EvdevSource {
        async fn next_event(&mut self) -> Option<InputEvent> {
            loop {
                let stream = self.stream.as_mut()?;
                let ev = match stream.next_event().await {
                    Ok(ev) => ev,
                    Err(e) => {
                        debug!("Read from {} ended: {}", self.label, e);
                        self.stream = None;
                        return None;
                    }
                };

                let InputEventKind::Key(key) = ev.kind() else {
                    continue;
                };
                let Some(state) = KeyState::from_raw(ev.value()) else {
                    trace!("Ignoring key value {} for code {}", ev.value(), key.code());
                    continue;
                };
                let at = monotonic_stamp(ev.timestamp(), SystemTime::now(), Instant::now());
                return Some(InputEvent::new(key.code(), state, at));
            }
        }

        fn describe(&self) -> String {
            self.label.clone()
        }
    }

    /// Place a kernel wall-clock event time on the monotonic clock, so a hold
    /// is measured between the kernel's timestamps rather than read times.
    /// Events stamped in the future (clock stepped back) map to `now_mono`.
    pub(crate) fn monotonic_stamp(
        event_time: SystemTime,
        now_sys: SystemTime,
        now_mono: Instant,
    ) -> Instant {
        now_sys
            .duration_since(event_time)
            .ok()
            .and_then(|age| now_mono.checked_sub(age))
            .unwrap_or(now_mono)
    }

}
