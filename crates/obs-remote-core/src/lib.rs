//! # obs-remote-core - Core Domain Types
//!
//! Foundation crate for obs-remote. Provides the event and result types that
//! flow between components, error handling, logging setup and the shutdown
//! signal.
//!
//! ## Public API
//!
//! ### Events (`events`)
//! - [`InputEvent`] / [`KeyState`] - One key transition read from the device
//! - [`Action`] - Short or long press, output of the classifier
//! - [`RemoteCommandResult`] - Per-call outcome of a remote command
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`ErrorKind`] - Coarse kind carried in connection state and results
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ### Shutdown (`shutdown`)
//! - [`Shutdown`] / [`ShutdownTrigger`] - Cancellation shared by all tasks
//!
//! ## Prelude
//!
//! ```rust
//! use obs_remote_core::prelude::*;
//! ```

pub mod error;
pub mod events;
pub mod logging;
pub mod shutdown;

/// Prelude for common imports used throughout all obs-remote crates
pub mod prelude {
    pub use super::error::{Error, ErrorKind, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

pub use error::{Error, ErrorKind, Result, ResultExt};
pub use events::{Action, InputEvent, KeyState, RemoteCommandResult};
pub use shutdown::{Shutdown, ShutdownTrigger};
