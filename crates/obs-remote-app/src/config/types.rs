//! Configuration types for obs-remote
//!
//! Defines:
//! - `Settings` - The settings file, one struct per section
//! - `RunConfig` - Validated settings, converted to component configs

use std::path::PathBuf;
use std::time::Duration;

use obs_remote_session::{CommandMode, LifecycleConfig, ObsProcess, SessionConfig};
use serde::Deserialize;

/// Application settings (config.toml)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub input: InputSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub target: TargetSettings,
}

/// Where the obs-websocket server listens
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Empty when authentication is disabled in OBS
    #[serde(default)]
    pub password: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: String::new(),
        }
    }
}

/// Which device and key to watch
#[derive(Debug, Clone, Deserialize)]
pub struct InputSettings {
    /// Key/button code, e.g. 316 for BTN_MODE. Required here or on the CLI.
    #[serde(default)]
    pub code: Option<u16>,

    /// Pin a specific `/dev/input/event*` node instead of scanning
    #[serde(default)]
    pub device_path: Option<PathBuf>,

    /// Delay between discovery attempts while no device matches
    #[serde(default = "default_device_retry_ms")]
    pub device_retry_ms: u64,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            code: None,
            device_path: None,
            device_retry_ms: default_device_retry_ms(),
        }
    }
}

/// Session client timing and command policy
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// "wait" or "fail-fast"
    #[serde(default)]
    pub mode: CommandMode,

    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            mode: CommandMode::default(),
            command_timeout_ms: default_command_timeout_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            keepalive_secs: default_keepalive_secs(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

/// The OBS process that a long press launches or closes
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSettings {
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Command name as shown in `/proc/<pid>/stat`
    #[serde(default = "default_process_name")]
    pub process_name: String,

    /// Refuse to close OBS while it is recording
    #[serde(default = "default_true")]
    pub protect_active_recording: bool,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_launch_grace_ms")]
    pub launch_grace_ms: u64,

    /// Ignore a long press that follows an accepted one this quickly
    #[serde(default = "default_toggle_cooldown_ms")]
    pub toggle_cooldown_ms: u64,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            process_name: default_process_name(),
            protect_active_recording: true,
            probe_timeout_ms: default_probe_timeout_ms(),
            launch_grace_ms: default_launch_grace_ms(),
            toggle_cooldown_ms: default_toggle_cooldown_ms(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    4455
}

fn default_device_retry_ms() -> u64 {
    2000
}

fn default_command_timeout_ms() -> u64 {
    5000
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_keepalive_secs() -> u64 {
    15
}

fn default_handshake_timeout_ms() -> u64 {
    5000
}

fn default_executable() -> String {
    "obs".to_string()
}

fn default_process_name() -> String {
    "obs".to_string()
}

fn default_true() -> bool {
    true
}

fn default_probe_timeout_ms() -> u64 {
    1500
}

fn default_launch_grace_ms() -> u64 {
    3000
}

fn default_toggle_cooldown_ms() -> u64 {
    2000
}

/// Everything the runner needs, produced by
/// [`validate_settings`](super::validate_settings).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub code: u16,
    pub device_path: Option<PathBuf>,
    pub device_retry: Duration,
    pub session: SessionConfig,
    pub lifecycle: LifecycleConfig,
    pub process: ObsProcess,
}

impl RunConfig {
    pub(crate) fn from_settings(settings: &Settings, code: u16) -> Self {
        let session = &settings.session;
        let target = &settings.target;
        Self {
            code,
            device_path: settings.input.device_path.clone(),
            device_retry: Duration::from_millis(settings.input.device_retry_ms),
            session: SessionConfig {
                host: settings.connection.host.clone(),
                port: settings.connection.port,
                password: settings.connection.password.clone(),
                mode: session.mode,
                command_timeout: Duration::from_millis(session.command_timeout_ms),
                initial_backoff: Duration::from_millis(session.initial_backoff_ms),
                max_backoff: Duration::from_millis(session.max_backoff_ms),
                keepalive_interval: Duration::from_secs(session.keepalive_secs),
                handshake_timeout: Duration::from_millis(session.handshake_timeout_ms),
            },
            lifecycle: LifecycleConfig {
                protect_active_recording: target.protect_active_recording,
                probe_timeout: Duration::from_millis(target.probe_timeout_ms),
                launch_grace: Duration::from_millis(target.launch_grace_ms),
                toggle_cooldown: Duration::from_millis(target.toggle_cooldown_ms),
            },
            process: ObsProcess::new(target.executable.clone(), target.process_name.clone()),
        }
    }
}
