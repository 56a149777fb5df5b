//! Activity signals observed on each interactive turn.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One bundle of activity signals.
///
/// Every field except the timestamp may be unknown. Unknown inputs never
/// cause a session boundary on their own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySignals {
    /// When the activity happened.
    pub at: DateTime<Utc>,
    /// Current version-control branch.
    #[serde(default)]
    pub branch: Option<String>,
    /// Current working directory.
    #[serde(default)]
    pub working_directory: Option<String>,
    /// Files touched in this turn.
    #[serde(default)]
    pub files: BTreeSet<String>,
}

impl ActivitySignals {
    /// Signals carrying only a timestamp.
    #[must_use]
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            at,
            branch: None,
            working_directory: None,
            files: BTreeSet::new(),
        }
    }

    /// Set the branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Set the touched files.
    #[must_use]
    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }
}
