//! obs-remote - Drive OBS recording from a single input-device button
//!
//! This is the binary entry point. All logic lives in the workspace crates.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use obs_remote_app::{apply_overrides, load_settings, validate_settings, CliOverrides};
use obs_remote_core::logging;

/// Short press toggles recording, long press launches or closes OBS
#[derive(Parser, Debug)]
#[command(name = "obs-remote", version)]
#[command(about = "Control OBS over obs-websocket from one key or button", long_about = None)]
struct Args {
    /// Key/button event code to watch (e.g. 316 for BTN_MODE)
    #[arg(long, value_name = "CODE")]
    code: Option<u16>,

    /// obs-websocket host
    #[arg(long)]
    host: Option<String>,

    /// obs-websocket port
    #[arg(long)]
    port: Option<u16>,

    /// obs-websocket password
    #[arg(long)]
    password: Option<String>,

    /// Use this /dev/input/event* node instead of scanning all devices
    #[arg(long, value_name = "PATH")]
    device: Option<PathBuf>,

    /// Settings file (default: ~/.config/obs-remote/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Also write logs to a daily-rotated file
    #[arg(long)]
    log_file: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    logging::init(args.log_file).wrap_err("Failed to initialize logging")?;

    let mut settings = load_settings(args.config.as_deref()).wrap_err("Failed to load settings")?;
    apply_overrides(
        &mut settings,
        CliOverrides {
            code: args.code,
            host: args.host,
            port: args.port,
            password: args.password,
            device: args.device,
        },
    );
    let config = validate_settings(&settings).wrap_err("Invalid configuration")?;

    obs_remote_app::run(config).await?;
    Ok(())
}
