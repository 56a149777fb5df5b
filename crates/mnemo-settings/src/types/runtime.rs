//! Logging and storage settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// Persistence settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Database file. A leading `~/` expands to the home directory.
    pub db_path: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// Maximum candidates fetched per turn.
    pub candidate_limit: usize,
}

impl StorageSettings {
    /// `db_path` with `~/` expanded.
    pub fn resolved_db_path(&self) -> PathBuf {
        match self.db_path.strip_prefix("~/") {
            Some(rest) => {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(rest)
            }
            None => PathBuf::from(&self.db_path),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: "~/.mnemo/continuity.db".to_string(),
            pool_size: 4,
            candidate_limit: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_is_kept() {
        let s = StorageSettings {
            db_path: "/var/lib/mnemo.db".into(),
            ..Default::default()
        };
        assert_eq!(s.resolved_db_path(), PathBuf::from("/var/lib/mnemo.db"));
    }

    #[test]
    fn tilde_is_expanded() {
        let resolved = StorageSettings::default().resolved_db_path();
        assert!(resolved.ends_with(".mnemo/continuity.db"));
        assert!(!resolved.starts_with("~"));
    }
}
