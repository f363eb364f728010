//! CLI command implementations

pub mod logs;
pub mod normalize;
pub mod preview;
pub mod reconcile;

use std::path::PathBuf;

use anyhow::{Context, Result};
use reconkit_core::{EntryPoint, LogEvent, LoggingService, ReconContext};

/// Get the event log for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let reconkit_dir = get_reconkit_dir();
    std::fs::create_dir_all(&reconkit_dir).ok()?;
    LoggingService::new(&reconkit_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the reconkit directory from environment or default
///
/// Falls back to `./.reconkit` when no home directory can be determined.
pub fn get_reconkit_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("RECONKIT_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".reconkit")
    }
}

/// Load settings and profiles from the reconkit directory
pub fn get_context() -> Result<ReconContext> {
    let reconkit_dir = get_reconkit_dir();
    ReconContext::new(&reconkit_dir).context("Failed to initialize reconkit context")
}
