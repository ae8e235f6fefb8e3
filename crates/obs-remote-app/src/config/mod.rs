//! Configuration for obs-remote
//!
//! Supports:
//! - `<config_dir>/obs-remote/config.toml` - Settings file
//! - Command-line overrides applied on top of the file

pub mod settings;
pub mod types;

pub use settings::{
    apply_overrides, default_config_path, load_settings, parse_settings, validate_settings,
    CliOverrides, KEY_MAX,
};
pub use types::*;
