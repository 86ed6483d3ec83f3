//! Pre-merge strategies.
//!
//! A strategy runs exactly once per workflow task, right before the feature
//! branch is merged. Failures are fatal to the task and never retried.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::git::Gateway;

/// What a task does to its feature branch before merging it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreMergeStrategy {
    /// Merge the branch as-is. Exposes merge-order races.
    None,
    /// Fetch, rebase onto the latest source tip, then force-push with lease.
    #[default]
    Rebase,
}

/// Where a strategy operates.
#[derive(Debug, Clone, Copy)]
pub struct PreMergeTarget<'a> {
    pub workdir: &'a Path,
    pub source_branch: &'a str,
    pub feature_branch: &'a str,
}

impl PreMergeStrategy {
    pub fn apply(&self, gateway: &Gateway, target: PreMergeTarget<'_>) -> Result<()> {
        match self {
            PreMergeStrategy::None => Ok(()),
            PreMergeStrategy::Rebase => {
                tracing::info!(
                    branch = target.feature_branch,
                    onto = target.source_branch,
                    "rebasing before merge"
                );
                gateway.fetch(target.workdir)?;
                gateway.rebase(target.workdir, target.source_branch)?;
                gateway.push_force_with_lease(target.workdir, target.feature_branch)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PreMergeStrategy::None => "none",
            PreMergeStrategy::Rebase => "rebase",
        }
    }
}

impl fmt::Display for PreMergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreMergeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "no-op" | "noop" => Ok(PreMergeStrategy::None),
            "rebase" => Ok(PreMergeStrategy::Rebase),
            _ => Err(Error::InvalidArgument(format!(
                "invalid pre-merge strategy '{s}': must be rebase or none"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_known_names() {
        assert_eq!("rebase".parse::<PreMergeStrategy>().unwrap(), PreMergeStrategy::Rebase);
        assert_eq!("None".parse::<PreMergeStrategy>().unwrap(), PreMergeStrategy::None);
        assert_eq!("no-op".parse::<PreMergeStrategy>().unwrap(), PreMergeStrategy::None);
        assert!("squash".parse::<PreMergeStrategy>().is_err());
    }

    #[test]
    fn default_is_rebase() {
        assert_eq!(PreMergeStrategy::default(), PreMergeStrategy::Rebase);
    }

    #[test]
    fn none_issues_no_git_calls() {
        let temp = TempDir::new().expect("tempdir");
        let gateway = Gateway::new();
        PreMergeStrategy::None
            .apply(
                &gateway,
                PreMergeTarget {
                    workdir: temp.path(),
                    source_branch: "master",
                    feature_branch: "feature/F1",
                },
            )
            .expect("noop");
        assert!(gateway.journal().is_empty());
    }

    #[test]
    fn rebase_stops_at_first_failure() {
        let temp = TempDir::new().expect("tempdir");
        let gateway = Gateway::new();
        let err = PreMergeStrategy::Rebase
            .apply(
                &gateway,
                PreMergeTarget {
                    workdir: temp.path(),
                    source_branch: "master",
                    feature_branch: "feature/F1",
                },
            )
            .expect_err("not a clone");
        assert!(matches!(err, Error::GitFailed { .. }));
        assert_eq!(gateway.journal().count("fetch"), 1);
        assert_eq!(gateway.journal().count("rebase"), 0);
    }
}
