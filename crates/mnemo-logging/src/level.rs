//! Log level names accepted in settings.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Minimum level of emitted events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Entry/exit points.
    Trace,
    /// Decision traces and intermediate values.
    Debug,
    /// Injections and session changes.
    Info,
    /// Degraded collaborators and dropped work.
    #[default]
    Warn,
    /// Failures.
    Error,
}

impl LogLevel {
    /// Filter directive for this level.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Parse a configured name, using [`LogLevel::Warn`] for anything unknown.
    pub fn from_setting(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" | "warning" => Self::Warn,
            "error" | "fatal" => Self::Error,
            other => return Err(format!("unknown log level: {other}")),
        };
        Ok(level)
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!(LogLevel::from_setting("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::from_setting(" info "), LogLevel::Info);
        assert_eq!(LogLevel::from_setting("fatal"), LogLevel::Error);
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
    }

    #[test]
    fn unknown_names_fall_back_to_warn() {
        assert!("chatty".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::from_setting("chatty"), LogLevel::Warn);
    }

    #[test]
    fn maps_onto_level_filters() {
        assert_eq!(LevelFilter::from(LogLevel::Info), LevelFilter::INFO);
        assert!(LogLevel::Trace < LogLevel::Warn);
        assert_eq!(LogLevel::Error.to_string(), "error");
    }
}
