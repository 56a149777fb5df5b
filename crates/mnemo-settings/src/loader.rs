//! Layered settings: compiled defaults, the user file, then environment.
//!
//! Loading flow:
//! 1. Start with compiled [`ContinuitySettings::default()`]
//! 2. If `~/.mnemo/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `MNEMO_*` environment variable overrides (highest priority)
//!
//! Loading does not validate; callers run [`ContinuitySettings::validate`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{ContinuitySettings, InjectionMode};

/// Resolve the path to the settings file (`~/.mnemo/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".mnemo").join("settings.json")
}

/// Load from [`settings_path`], then apply environment overrides.
pub fn load_settings() -> Result<ContinuitySettings> {
    load_settings_from_path(&settings_path())
}

/// Load from `path`, then apply environment overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ContinuitySettings> {
    let defaults = serde_json::to_value(ContinuitySettings::default())?;

    let merged = match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "reading settings file");
            deep_merge(defaults, serde_json::from_str(&content)?)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            defaults
        }
        Err(e) => return Err(e.into()),
    };

    let mut settings: ContinuitySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Merge `overlay` into `base`, recursing into objects.
///
/// Keys present only in `base` survive. A `null` in `overlay` keeps the base
/// value; any other non-object value replaces it wholesale, arrays included.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay.into_iter().filter(|(_, v)| !v.is_null()) {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = base.insert(key, merged);
            }
            Value::Object(base)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Apply `MNEMO_*` environment overrides to loaded settings.
///
/// Unparseable or out-of-range values are logged and skipped.
pub fn apply_env_overrides(settings: &mut ContinuitySettings) {
    let session = &mut settings.session;
    override_with("MNEMO_SESSION_GAP_SECS", |v| in_range(v, 60u64, 86_400), |v| {
        session.session_boundary_time_threshold_seconds = v;
    });
    override_with("MNEMO_FILE_CONTINUITY_THRESHOLD", unit_interval, |v| {
        session.file_continuity_threshold = v;
    });

    override_with("MNEMO_COMPRESSION_RATIO", |v| in_range(v, 0.01, 1.0), |v| {
        settings.summary.compression_ratio = v;
    });

    let injection = &mut settings.injection;
    override_with("MNEMO_BASE_CONFIDENCE", unit_interval, |v| {
        injection.base_injection_confidence = v;
    });
    override_with("MNEMO_MAX_INJECTION_TOKENS", |v| in_range(v, 1usize, 100_000), |v| {
        injection.max_injection_tokens = v;
    });
    override_with("MNEMO_ADAPTIVE_THRESHOLDS", parse_bool, |v| {
        injection.adaptive_thresholds = v;
    });
    override_with("MNEMO_CONSTRAINED", parse_bool, |constrained| {
        injection.mode = if constrained {
            InjectionMode::Constrained
        } else {
            InjectionMode::Standard
        };
    });
    override_with("MNEMO_LATENCY_BUDGET_MS", |v| in_range(v, 10u64, 60_000), |v| {
        injection.latency_budget_ms = v;
    });

    override_with("MNEMO_LOG_LEVEL", non_empty, |v| settings.logging.level = v);
    override_with("MNEMO_LOG_JSON", parse_bool, |v| settings.logging.json = v);
    override_with("MNEMO_DB_PATH", non_empty, |v| settings.storage.db_path = v);
}

/// Parse a boolean flag: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`,
/// case-insensitively.
pub fn parse_bool(raw: &str) -> Option<bool> {
    const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
    const FALSY: [&str; 4] = ["false", "0", "no", "off"];
    let raw = raw.trim().to_ascii_lowercase();
    if TRUTHY.contains(&raw.as_str()) {
        Some(true)
    } else if FALSY.contains(&raw.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Parse a number and keep it only when it lies in `[min, max]`.
///
/// NaN never compares inside a range, and infinities fail for finite bounds.
pub fn in_range<T>(raw: &str, min: T, max: T) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    raw.trim().parse::<T>().ok().filter(|n| *n >= min && *n <= max)
}

fn unit_interval(raw: &str) -> Option<f64> {
    in_range(raw, 0.0, 1.0)
}

fn non_empty(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

fn override_with<T>(key: &str, parse: impl FnOnce(&str) -> Option<T>, apply: impl FnOnce(T)) {
    let Ok(raw) = std::env::var(key) else {
        return;
    };
    match parse(&raw) {
        Some(value) => {
            debug!(key, "settings override from environment");
            apply(value);
        }
        None => warn!(key, value = %raw, "ignoring invalid environment override"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
