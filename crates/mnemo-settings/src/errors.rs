//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in the settings file.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value failed validation.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Shorthand for settings results.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_file_reports_json_error() {
        let err: SettingsError = serde_json::from_str::<serde_json::Value>("{\"injection\":")
            .unwrap_err()
            .into();
        assert!(matches!(err, SettingsError::Json(_)));
        assert!(err.to_string().starts_with("failed to parse settings JSON"));
    }

    #[test]
    fn validation_message_is_preserved() {
        let err = SettingsError::InvalidValue("compressionRatio must be in (0, 1]".to_string());
        assert!(err.to_string().ends_with("compressionRatio must be in (0, 1]"));
    }
}
