//! Logging configuration using tracing

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Environment variable holding the log filter directive.
pub const LOG_ENV_VAR: &str = "OBS_REMOTE_LOG";

const LOG_FILE_NAME: &str = "obs-remote.log";

/// Initialize the logging subsystem
///
/// Logs always go to stderr. With `to_file` set, they are also written to a
/// daily-rotated file under `~/.local/share/obs-remote/logs/`.
/// Log level is controlled by the `OBS_REMOTE_LOG` environment variable.
///
/// # Examples
/// ```bash
/// OBS_REMOTE_LOG=debug obs-remote --code 317
/// OBS_REMOTE_LOG=obs_remote_session=trace obs-remote --code 317
/// ```
pub fn init(to_file: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = if to_file {
        let log_dir = get_log_directory();
        std::fs::create_dir_all(&log_dir)?;
        let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);
        Some(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    tracing::info!("obs-remote {} starting", env!("CARGO_PKG_VERSION"));
    if to_file {
        tracing::info!("Logging to {}", get_current_log_file().display());
    }

    Ok(())
}

/// Get the log directory path
fn get_log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("obs-remote").join("logs")
}

/// Base path of the rolling log file; the appender adds a date suffix
pub fn get_current_log_file() -> PathBuf {
    get_log_directory().join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_lives_under_app_directory() {
        let path = get_current_log_file();
        assert!(path.ends_with("obs-remote/logs/obs-remote.log"));
    }
}
