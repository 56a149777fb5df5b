//! # mnemo-logging
//!
//! Structured logging with `tracing`.
//!
//! - [`init_subscriber`]: compact human-readable output on stderr
//! - [`init_json_subscriber`]: one JSON object per line on stderr
//! - [`init_from_settings`]: pick one of the above from [`LoggingSettings`]
//! - [`capture_logs`]: in-memory capture for assertions in tests
//!
//! `RUST_LOG`, when set, wins over the configured level.

#![deny(unsafe_code)]

pub mod capture;
pub mod level;

pub use capture::{CapturedEvent, CapturedLogs, capture_logs};
pub use level::LogLevel;

use mnemo_settings::LoggingSettings;
use tracing_subscriber::EnvFilter;

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(LogLevel::from_setting(level).as_str()))
}

/// Install the global subscriber with compact stderr output.
///
/// Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init fails harmlessly when a global subscriber already exists
    let _ = subscriber.try_init();
}

/// Install the global subscriber with JSON-lines stderr output.
///
/// Subsequent calls are no-ops.
pub fn init_json_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .json();

    let _ = subscriber.try_init();
}

/// Install the global subscriber described by `settings`.
pub fn init_from_settings(settings: &LoggingSettings) {
    if settings.json {
        init_json_subscriber(&settings.level);
    } else {
        init_subscriber(&settings.level);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
