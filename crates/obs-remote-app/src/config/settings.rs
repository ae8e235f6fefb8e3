//! Settings loading, CLI overrides and validation

use std::path::{Path, PathBuf};

use obs_remote_core::prelude::*;

use super::types::{RunConfig, Settings};

const CONFIG_DIR: &str = "obs-remote";
const CONFIG_FILENAME: &str = "config.toml";

/// Highest key code the kernel input layer defines.
pub const KEY_MAX: u16 = 0x2ff;

/// Values given on the command line. `None` keeps the file's value.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub code: Option<u16>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    pub device: Option<PathBuf>,
}

/// `<config_dir>/obs-remote/config.toml`, e.g. `~/.config/obs-remote/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILENAME))
}

/// Load settings from `explicit`, or from the default location.
///
/// A missing default file yields defaults; a missing explicit file is an
/// error. Unreadable or unparseable files are always errors.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::ConfigNotFound {
                    path: path.to_path_buf(),
                });
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            Some(path) => {
                debug!("No config file at {:?}, using defaults", path);
                return Ok(Settings::default());
            }
            None => {
                debug!("No config directory on this platform, using defaults");
                return Ok(Settings::default());
            }
        },
    };

    let content = std::fs::read_to_string(&config_path)
        .map_err(|e| Error::config(format!("Failed to read {:?}: {}", config_path, e)))?;
    let settings: Settings = toml::from_str(&content)
        .map_err(|e| Error::config_invalid(format!("{}: {}", config_path.display(), e)))?;
    debug!("Loaded settings from {:?}", config_path);
    Ok(settings)
}

/// Parse a settings document.
pub fn parse_settings(content: &str) -> Result<Settings> {
    toml::from_str(content).map_err(|e| Error::config_invalid(e.to_string()))
}

/// Apply command-line values on top of file settings.
pub fn apply_overrides(settings: &mut Settings, overrides: CliOverrides) {
    if let Some(code) = overrides.code {
        settings.input.code = Some(code);
    }
    if let Some(host) = overrides.host {
        settings.connection.host = host;
    }
    if let Some(port) = overrides.port {
        settings.connection.port = port;
    }
    if let Some(password) = overrides.password {
        settings.connection.password = password;
    }
    if let Some(device) = overrides.device {
        settings.input.device_path = Some(device);
    }
}

/// Check settings before any loop starts and convert them for the runner.
pub fn validate_settings(settings: &Settings) -> Result<RunConfig> {
    let code = settings.input.code.ok_or_else(|| {
        Error::config_invalid("no key code configured (use --code or [input] code)")
    })?;
    if code > KEY_MAX {
        return Err(Error::config_invalid(format!(
            "key code {} exceeds KEY_MAX ({})",
            code, KEY_MAX
        )));
    }

    if settings.connection.host.trim().is_empty() {
        return Err(Error::config_invalid("connection host is empty"));
    }
    if settings.connection.port == 0 {
        return Err(Error::config_invalid("connection port must be non-zero"));
    }

    let session = &settings.session;
    if session.initial_backoff_ms > session.max_backoff_ms {
        return Err(Error::config_invalid(format!(
            "initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
            session.initial_backoff_ms, session.max_backoff_ms
        )));
    }

    let durations = [
        ("input.device_retry_ms", settings.input.device_retry_ms),
        ("session.command_timeout_ms", session.command_timeout_ms),
        ("session.initial_backoff_ms", session.initial_backoff_ms),
        ("session.keepalive_secs", session.keepalive_secs),
        ("session.handshake_timeout_ms", session.handshake_timeout_ms),
        ("target.probe_timeout_ms", settings.target.probe_timeout_ms),
    ];
    if let Some((name, _)) = durations.iter().find(|(_, value)| *value == 0) {
        return Err(Error::config_invalid(format!("{} must be non-zero", name)));
    }

    if settings.target.executable.trim().is_empty() {
        return Err(Error::config_invalid("target executable is empty"));
    }

    Ok(RunConfig::from_settings(settings, code))
}
