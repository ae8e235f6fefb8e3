//! # obs-remote-input - Input Device Handling
//!
//! Finds the device that emits the configured event code, reads its key
//! events and turns complete presses into [`Action`]s.
//!
//! ## Public API
//!
//! - [`PressClassifier`] - Idle/Pressed state machine, short vs long press
//! - [`EventSource`] / [`DeviceDiscovery`] - Seams over the input subsystem
//! - [`DeviceWatcher`] - Discovery, retry and classification loop
//! - `EvdevDiscovery` / `EvdevSource` - evdev backend (Linux only)
//!
//! [`Action`]: obs_remote_core::Action

pub mod classifier;
pub mod device;
pub mod watcher;

pub use classifier::{classify_hold, PressClassifier, PressPhase, LONG_PRESS_THRESHOLD};
pub use device::{DeviceDiscovery, EventSource, LocalEventSource};
#[cfg(target_os = "linux")]
pub use device::{EvdevDiscovery, EvdevSource};
pub use watcher::{DeviceWatcher, DEFAULT_RETRY_INTERVAL};
