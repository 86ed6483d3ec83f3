//! Read-only inspection of the shared remote.
//!
//! Uses libgit2 directly against the bare repository, so inspecting never
//! shows up in the gateway journal and never changes the remote.

use std::collections::BTreeMap;
use std::path::Path;

use git2::{BranchType, Oid, Repository, Sort};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::feature::FEATURE_BRANCH_PREFIX;

/// One commit on a branch's first-parent history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub id: String,
    pub summary: String,
    pub author: String,
    pub parents: usize,
    /// For merge commits: commits brought in by the second parent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_commits: Option<Vec<String>>,
}

impl CommitSummary {
    pub fn is_merge(&self) -> bool {
        self.parents > 1
    }
}

/// State of the shared remote after a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteSummary {
    pub branches: Vec<String>,
    pub open_feature_branches: Vec<String>,
    /// First-parent history per inspected branch, newest first.
    pub history: BTreeMap<String, Vec<CommitSummary>>,
}

impl RemoteSummary {
    /// Inspect the repository at `path`, recording history for `branches`.
    pub fn read(path: &Path, branches: &[String]) -> Result<Self> {
        let repo = Repository::open(path)?;
        let all = branch_names(&repo)?;
        let open_feature_branches = all
            .iter()
            .filter(|name| name.starts_with(FEATURE_BRANCH_PREFIX))
            .cloned()
            .collect();

        let mut history = BTreeMap::new();
        for branch in branches {
            if all.contains(branch) {
                history.insert(branch.clone(), first_parent_log(&repo, branch)?);
            }
        }

        Ok(Self {
            branches: all,
            open_feature_branches,
            history,
        })
    }

    /// Merge commits on `branch`, newest first.
    pub fn merges_on(&self, branch: &str) -> Vec<&CommitSummary> {
        self.history
            .get(branch)
            .map(|log| log.iter().filter(|commit| commit.is_merge()).collect())
            .unwrap_or_default()
    }
}

/// Local branch names of `repo`, sorted.
pub fn branch_names(repo: &Repository) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for branch in repo.branches(Some(BranchType::Local))? {
        let (branch, _) = branch?;
        if let Some(name) = branch.name()? {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// First-parent history of `branch`, newest first.
pub fn first_parent_log(repo: &Repository, branch: &str) -> Result<Vec<CommitSummary>> {
    let tip = repo
        .find_branch(branch, BranchType::Local)?
        .get()
        .target()
        .ok_or_else(|| Error::OperationFailed(format!("branch '{branch}' has no target")))?;

    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TOPOLOGICAL)?;
    walk.simplify_first_parent()?;
    walk.push(tip)?;

    let mut log = Vec::new();
    for oid in walk {
        log.push(summarize(repo, oid?)?);
    }
    Ok(log)
}

fn summarize(repo: &Repository, oid: Oid) -> Result<CommitSummary> {
    let commit = repo.find_commit(oid)?;
    let merged_commits = if commit.parent_count() > 1 {
        Some(merged_by(repo, commit.parent_id(0)?, commit.parent_id(1)?)?)
    } else {
        None
    };
    let author = commit.author().name().unwrap_or("").to_string();
    Ok(CommitSummary {
        id: oid.to_string(),
        summary: commit.summary().unwrap_or("").to_string(),
        author,
        parents: commit.parent_count(),
        merged_commits,
    })
}

/// Summaries of commits reachable from `theirs` but not from `ours`, oldest first.
fn merged_by(repo: &Repository, ours: Oid, theirs: Oid) -> Result<Vec<String>> {
    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
    walk.push(theirs)?;
    walk.hide(ours)?;

    let mut summaries = Vec::new();
    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        summaries.push(commit.summary().unwrap_or("").to_string());
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(repo: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo)
            .output()
            .expect("run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn commit_file(repo: &Path, name: &str, message: &str) {
        std::fs::write(repo.join(name), message).expect("write file");
        git(repo, &["add", name]);
        git(repo, &["commit", "-m", message]);
    }

    #[test]
    fn reads_merges_and_feature_branches() {
        let temp = TempDir::new().expect("tempdir");
        let repo = temp.path();
        git(repo, &["init", "--initial-branch", "master"]);
        git(repo, &["config", "user.email", "test@test.com"]);
        git(repo, &["config", "user.name", "Test"]);
        commit_file(repo, "README.md", "seed");

        git(repo, &["checkout", "-b", "feature/F1"]);
        commit_file(repo, "F1.0.txt", "F1 0/2");
        commit_file(repo, "F1.1.txt", "F1 1/2");
        git(repo, &["checkout", "master"]);
        git(repo, &["merge", "--no-ff", "-m", "add F1", "feature/F1"]);
        git(repo, &["branch", "feature/F2"]);

        let summary =
            RemoteSummary::read(repo, &["master".to_string(), "missing".to_string()])
                .expect("summary");

        assert_eq!(summary.open_feature_branches, vec!["feature/F1", "feature/F2"]);
        assert!(!summary.history.contains_key("missing"));

        let log = &summary.history["master"];
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].summary, "add F1");
        assert_eq!(log[1].summary, "seed");

        let merges = summary.merges_on("master");
        assert_eq!(merges.len(), 1);
        assert_eq!(
            merges[0].merged_commits.as_deref(),
            Some(&["F1 0/2".to_string(), "F1 1/2".to_string()][..])
        );
    }
}
