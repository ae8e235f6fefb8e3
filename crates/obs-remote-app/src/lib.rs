//! # obs-remote-app - Application Layer
//!
//! Wires the input and session crates together: settings, action dispatch,
//! task orchestration and signal handling.
//!
//! ## Public API
//!
//! ### Configuration (`config`)
//! - [`Settings`] - `config.toml` contents
//! - [`load_settings`] / [`apply_overrides`] / [`validate_settings`] - Startup pipeline
//! - [`RunConfig`] - Validated settings handed to the runner
//!
//! ### Dispatch (`dispatcher`)
//! - [`ActionDispatcher`] - Short press → toggle recording, long press → toggle OBS
//!
//! ### Runner (`runner`)
//! - [`run`] - Run until SIGINT/SIGTERM
//! - [`run_tasks`] - Watcher + dispatcher over any discovery and control backend

pub mod config;
pub mod dispatcher;
pub mod runner;
pub mod signals;

pub use config::{
    apply_overrides, default_config_path, load_settings, validate_settings, CliOverrides,
    RunConfig, Settings,
};
pub use dispatcher::ActionDispatcher;
pub use runner::{run, run_tasks, RunSummary};
