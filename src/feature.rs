//! Feature descriptors.
//!
//! A feature names a unit of work, how many commits it takes, which branch it
//! starts from and which branch it is merged into. The derived branch name is
//! always `feature/<name>`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Prefix of every feature branch.
pub const FEATURE_BRANCH_PREFIX: &str = "feature/";

/// What one workflow task builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub commits: u32,
    pub source: String,
    pub destination: String,
}

impl Feature {
    pub fn new(
        name: impl Into<String>,
        commits: u32,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            commits,
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Feature whose source and destination are the same branch.
    pub fn on(branch: &str, name: impl Into<String>, commits: u32) -> Self {
        Self::new(name, commits, branch, branch)
    }

    /// Check the precondition that must hold before any git call is made.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(Error::InvalidFeatureName(self.name.clone()));
        }
        for (field, branch) in [("source", &self.source), ("destination", &self.destination)] {
            if branch.trim().is_empty() || branch.chars().any(char::is_whitespace) {
                return Err(Error::InvalidArgument(format!(
                    "feature '{}': {field} branch '{branch}' is not a valid branch name",
                    self.name
                )));
            }
        }
        Ok(())
    }

    pub fn branch_name(&self) -> String {
        format!("{FEATURE_BRANCH_PREFIX}{}", self.name)
    }

    /// File materialized by commit `index`.
    pub fn file_name(&self, index: u32) -> String {
        format!("{}.{index}.txt", self.name)
    }

    /// Message of commit `index`, e.g. `F1 0/3`.
    pub fn commit_message(&self, index: u32) -> String {
        format!("{} {index}/{}", self.name, self.commits)
    }

    /// Message of the merge commit on the destination branch.
    pub fn merge_message(&self) -> String {
        format!("add {}", self.name)
    }
}
