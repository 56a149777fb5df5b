//! Error hierarchy shared across the continuity engine.
//!
//! Only [`ContinuityError::Configuration`] is fatal. Collaborator failures
//! are recovered locally by the engine, and an over-tight token budget is
//! reported as an outcome value rather than an error.

use thiserror::Error;

/// Errors raised by the continuity engine and its collaborators.
#[derive(Debug, Error)]
pub enum ContinuityError {
    /// A threshold or weight was invalid at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An external collaborator (similarity search, thread graph, store)
    /// could not answer.
    #[error("{collaborator} unavailable: {message}")]
    CollaboratorUnavailable {
        /// Which collaborator failed.
        collaborator: &'static str,
        /// Failure detail.
        message: String,
    },

    /// Persistence failed.
    #[error("store error: {0}")]
    Store(String),
}

impl ContinuityError {
    /// Shorthand for a [`ContinuityError::CollaboratorUnavailable`].
    pub fn unavailable(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            collaborator,
            message: message.into(),
        }
    }

    /// Whether this error must abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Convenience alias for results carrying a [`ContinuityError`].
pub type Result<T> = std::result::Result<T, ContinuityError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
