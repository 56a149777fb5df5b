//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file only needs the keys it changes.

mod injection;
mod runtime;
mod scoring;
mod session;
mod summary;

pub use injection::*;
pub use runtime::*;
pub use scoring::*;
pub use session::*;
pub use summary::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "session": { "sessionBoundaryTimeThresholdSeconds": 2400 },
///   "injection": { "maxInjectionTokens": 1200, "adaptiveThresholds": true }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContinuitySettings {
    /// Settings schema version.
    pub version: String,
    /// Session boundary detection.
    pub session: SessionSettings,
    /// Relevance scoring.
    pub scoring: ScoringSettings,
    /// Hierarchical summarization.
    pub summary: SummarySettings,
    /// Injection gating and compression.
    pub injection: InjectionSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Persistence.
    pub storage: StorageSettings,
}

impl Default for ContinuitySettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            session: SessionSettings::default(),
            scoring: ScoringSettings::default(),
            summary: SummarySettings::default(),
            injection: InjectionSettings::default(),
            logging: LoggingSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(ContinuitySettings::default()).unwrap();
        assert_eq!(json["session"]["sessionBoundaryTimeThresholdSeconds"], 1800);
        assert_eq!(json["injection"]["maxInjectionTokens"], 2000);
        assert_eq!(json["scoring"]["weights"]["fileOverlap"], 0.3);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: ContinuitySettings =
            serde_json::from_str(r#"{"summary": {"compressionRatio": 0.5}}"#).unwrap();
        assert!((s.summary.compression_ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(s.summary.recent_window_seconds, 86_400);
        assert_eq!(s.injection, InjectionSettings::default());
    }
}
