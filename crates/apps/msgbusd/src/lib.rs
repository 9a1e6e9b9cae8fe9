//! Process wiring for the `msgbusd` binary: CLI argument shape, config
//! file loading, and the router/acceptor/demo-endpoint assembly that the
//! binary's `main` drives. Split out of `src/bin` so it can be exercised
//! by integration tests without spawning a process, the way
//! `reticulum_daemon` separates `config`/`identity_store` from
//! `src/bin/reticulumd`.

mod app;
pub mod config;
mod error;

pub use app::{heartbeat_id, DemoBus};
pub use config::DaemonConfig;
pub use error::DaemonError;

use std::fs;
use std::path::Path;

/// Reads and parses a config file, distinguishing an unreadable file from
/// a malformed one instead of collapsing both into `io::Error` the way
/// [`DaemonConfig::from_path`] does — integration tests and the CLI's
/// error reporting want the distinction.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DaemonConfig, DaemonError> {
    let contents = fs::read_to_string(path)?;
    let config = DaemonConfig::from_toml(&contents)?;
    Ok(config)
}
