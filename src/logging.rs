//! Logging/tracing setup (§2, component 11): initializes the
//! `tracing-subscriber` pipeline whose verbosity is controlled by
//! `ICINGA_DEBUG`, mirroring the three-level verbosity the original tool
//! exposed through its own Icinga2 client's `Debug` flag.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::DebugLevel;

/// Installs a global `fmt` subscriber at the level [`DebugLevel`] selects.
/// Idempotent-enough for a single-process binary; tests that need
/// isolated logging should not call this.
pub fn init(level: DebugLevel) {
    let default_level = LevelFilter::from_level(level.as_tracing_level());
    let filter = EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
