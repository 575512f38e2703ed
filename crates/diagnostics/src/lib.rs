//! Logging setup shared by the zkmock crates
//!
//! Usage:
//! - Set ZKMOCK_LOG=off (default) - no logs
//! - Set ZKMOCK_LOG=info - session lifecycle and store resets
//! - Set ZKMOCK_LOG=debug - one line per store operation (needs trace logging enabled)

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable consulted by [`init_diagnostics`].
pub const LOG_ENV: &str = "ZKMOCK_LOG";

static INIT: Once = Once::new();

/// Map a level name to the minimum level it enables.
///
/// Returns `Ok(None)` for "off" and `Err(())` for names we don't know.
fn parse_level(name: &str) -> Result<Option<emit::Level>, ()> {
    match name {
        "off" => Ok(None),
        "debug" => Ok(Some(emit::Level::Debug)),
        "info" => Ok(Some(emit::Level::Info)),
        "warn" => Ok(Some(emit::Level::Warn)),
        "error" => Ok(Some(emit::Level::Error)),
        _ => Err(()),
    }
}

/// Initialize diagnostics based on the ZKMOCK_LOG environment variable
///
/// Safe to call multiple times - subsequent calls will be ignored.
pub fn init_diagnostics() {
    init_with_default("off");
}

/// Initialize diagnostics, using `default_level` when ZKMOCK_LOG is unset.
///
/// The environment always wins so a test run can silence or widen the output
/// without touching code. Only the first call in a process has any effect.
pub fn init_with_default(default_level: &str) {
    INIT.call_once(|| {
        let log_level = std::env::var(LOG_ENV).unwrap_or_else(|_| default_level.to_string());

        let level = match parse_level(&log_level) {
            Ok(Some(level)) => level,
            Ok(None) => return, // No setup needed
            Err(()) => {
                // Bootstrap warning - emit is not running yet
                eprintln!("Warning: Unknown {LOG_ENV} value '{log_level}', using 'info'");
                emit::Level::Info
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        // The runtime has to outlive every test in the process.
        std::mem::forget(rt);
    });
}

/// Log basic operations (session open/close, store reset)
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (per-operation traces)
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log warning conditions (misuse that the store tolerates)
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log error conditions
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;
