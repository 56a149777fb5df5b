//! # mnemo-settings
//!
//! Configuration for the continuity engine, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`ContinuitySettings::default()`]
//! 2. **User file**: `~/.mnemo/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `MNEMO_*` overrides (highest priority)
//!
//! Loaded settings are checked with [`ContinuitySettings::validate`]; a
//! validation failure is fatal at startup.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;
mod validate;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<ContinuitySettings> = OnceLock::new();

/// Process-wide settings.
///
/// Loads on first call and falls back to compiled defaults when the file is
/// unreadable or invalid. Library code should take settings explicitly;
/// this accessor is for binaries.
pub fn get_settings() -> &'static ContinuitySettings {
    SETTINGS.get_or_init(|| {
        load_settings()
            .and_then(|s| s.validate().map(|()| s))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "settings rejected, using defaults");
                ContinuitySettings::default()
            })
    })
}

/// Install process-wide settings before first access.
///
/// # Errors
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(
    settings: ContinuitySettings,
) -> std::result::Result<(), ContinuitySettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = ContinuitySettings::default();
        assert_eq!(s.session.session_boundary_time_threshold_seconds, 1800);
        assert!((s.session.file_continuity_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(s.summary.immediate_window_seconds, 7200);
        assert_eq!(s.summary.recent_window_seconds, 86_400);
        assert!((s.summary.compression_ratio - 0.3).abs() < f64::EPSILON);
        assert!((s.injection.base_injection_confidence - 0.3).abs() < f64::EPSILON);
        assert_eq!(s.injection.max_injection_tokens, 2000);
        assert!(!s.injection.adaptive_thresholds);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn path_points_into_dot_mnemo() {
        let path = settings_path();
        assert!(path.ends_with(".mnemo/settings.json"));
    }
}
