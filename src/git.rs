//! Version-control gateway.
//!
//! Every state-changing operation in a scenario goes through [`Gateway`],
//! which runs the `git` executable synchronously. A call never yields to the
//! scheduler, so two lanes can only interleave between git calls, never
//! inside one.
//!
//! Each call is logged with its working directory and full command line
//! before it runs, and recorded in a shared [`Journal`] so a finished
//! scenario can be audited (how many rebases ran, in which clone, in which
//! order).

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::error::{Error, Result};

/// One recorded git invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitCall {
    pub cwd: PathBuf,
    pub args: Vec<String>,
}

impl GitCall {
    /// First argument, e.g. `push` or `rebase`.
    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }

    pub fn command_line(&self) -> String {
        format!("git {}", self.args.join(" "))
    }
}

/// Ordered log of every git call issued through a gateway and its clones.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<GitCall>>>,
}

impl Journal {
    fn lock(&self) -> MutexGuard<'_, Vec<GitCall>> {
        // A poisoned journal still holds valid entries.
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: GitCall) {
        self.lock().push(call);
    }

    /// Snapshot of all calls in issue order.
    pub fn calls(&self) -> Vec<GitCall> {
        self.lock().clone()
    }

    /// Calls issued from inside `cwd`.
    pub fn calls_in(&self, cwd: &Path) -> Vec<GitCall> {
        self.lock()
            .iter()
            .filter(|call| call.cwd == cwd)
            .cloned()
            .collect()
    }

    /// Number of calls whose subcommand equals `subcommand`.
    pub fn count(&self, subcommand: &str) -> usize {
        self.lock()
            .iter()
            .filter(|call| call.subcommand() == subcommand)
            .count()
    }

    /// Number of calls per subcommand.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for call in self.lock().iter() {
            *counts.entry(call.subcommand().to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Synchronous wrapper around the `git` executable.
#[derive(Debug, Clone)]
pub struct Gateway {
    program: PathBuf,
    journal: Journal,
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    /// Gateway using `git` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("git")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            journal: Journal::default(),
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Run `git <args>` in `cwd` and return its stdout.
    ///
    /// Arguments reach git unchanged; the journal keeps a lossy UTF-8 copy.
    pub fn run<S: AsRef<OsStr>>(&self, cwd: &Path, args: &[S]) -> Result<String> {
        let call = GitCall {
            cwd: cwd.to_path_buf(),
            args: args
                .iter()
                .map(|arg| arg.as_ref().to_string_lossy().into_owned())
                .collect(),
        };
        tracing::info!(cwd = %cwd.display(), "$ {}", call.command_line());
        let command_line = call.command_line();
        self.journal.record(call);

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .env("GIT_MERGE_AUTOEDIT", "no")
            .env("GIT_EDITOR", "true")
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|err| {
                Error::OperationFailed(format!(
                    "failed to launch {}: {err}",
                    self.program.display()
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let combined = [stdout.trim(), stderr.trim()]
                .iter()
                .filter(|part| !part.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join("\n");
            tracing::warn!(cwd = %cwd.display(), status = %output.status, "{command_line} failed");
            return Err(Error::GitFailed {
                cwd: cwd.to_path_buf(),
                command: command_line,
                output: combined,
            });
        }

        for line in stdout.lines().chain(stderr.lines()) {
            tracing::debug!("  [{}] {}", cwd.display(), line);
        }
        Ok(stdout)
    }

    // =========================================================================
    // Repository setup
    // =========================================================================

    /// `git init --bare --initial-branch <branch> <path>`, run from `cwd`.
    pub fn init_bare(&self, cwd: &Path, path: &Path, initial_branch: &str) -> Result<()> {
        self.run(
            cwd,
            &[
                OsStr::new("init"),
                OsStr::new("--bare"),
                OsStr::new("--initial-branch"),
                OsStr::new(initial_branch),
                path.as_os_str(),
            ],
        )?;
        Ok(())
    }

    /// `git clone <remote> <dest>`, run from `cwd`.
    pub fn clone_repo(&self, cwd: &Path, remote: &Path, dest: &Path) -> Result<()> {
        self.run(
            cwd,
            &[OsStr::new("clone"), remote.as_os_str(), dest.as_os_str()],
        )?;
        Ok(())
    }

    /// Set `user.name` and `user.email` in the clone at `cwd`.
    pub fn configure_identity(&self, cwd: &Path, name: &str, email: &str) -> Result<()> {
        self.run(cwd, &["config", "user.name", name])?;
        self.run(cwd, &["config", "user.email", email])?;
        Ok(())
    }

    // =========================================================================
    // Branches and commits
    // =========================================================================

    /// `git checkout -b <branch> <start>`.
    pub fn checkout_new_branch(&self, cwd: &Path, branch: &str, start: &str) -> Result<()> {
        self.run(cwd, &["checkout", "-b", branch, start])?;
        Ok(())
    }

    pub fn checkout(&self, cwd: &Path, branch: &str) -> Result<()> {
        self.run(cwd, &["checkout", branch])?;
        Ok(())
    }

    pub fn add(&self, cwd: &Path, file: &str) -> Result<()> {
        self.run(cwd, &["add", file])?;
        Ok(())
    }

    pub fn commit(&self, cwd: &Path, message: &str) -> Result<()> {
        self.run(cwd, &["commit", "-m", message])?;
        Ok(())
    }

    /// `git merge --no-ff -m <message> <branch>`.
    pub fn merge_no_ff(&self, cwd: &Path, branch: &str, message: &str) -> Result<()> {
        self.run(cwd, &["merge", "--no-ff", "-m", message, branch])?;
        Ok(())
    }

    /// `git rebase origin/<branch>`.
    pub fn rebase(&self, cwd: &Path, onto_branch: &str) -> Result<()> {
        let upstream = format!("origin/{onto_branch}");
        self.run(cwd, &["rebase", upstream.as_str()])?;
        Ok(())
    }

    // =========================================================================
    // Remote synchronisation
    // =========================================================================

    /// Plain `git push` of the current branch to its upstream.
    pub fn push(&self, cwd: &Path) -> Result<()> {
        self.run(cwd, &["push"])?;
        Ok(())
    }

    /// `git push --set-upstream origin <branch>`.
    pub fn push_set_upstream(&self, cwd: &Path, branch: &str) -> Result<()> {
        self.run(cwd, &["push", "--set-upstream", "origin", branch])?;
        Ok(())
    }

    /// `git push origin <refspec>`.
    pub fn push_refspec(&self, cwd: &Path, refspec: &str) -> Result<()> {
        self.run(cwd, &["push", "origin", refspec])?;
        Ok(())
    }

    /// `git push --force-with-lease origin <branch>`.
    ///
    /// Refuses to overwrite the remote ref if it moved since the last fetch.
    pub fn push_force_with_lease(&self, cwd: &Path, branch: &str) -> Result<()> {
        self.run(cwd, &["push", "--force-with-lease", "origin", branch])?;
        Ok(())
    }

    /// `git push origin :<branch>` deletes the branch on the remote.
    pub fn delete_remote_branch(&self, cwd: &Path, branch: &str) -> Result<()> {
        let refspec = format!(":{branch}");
        self.push_refspec(cwd, &refspec)
    }

    pub fn pull(&self, cwd: &Path) -> Result<()> {
        self.run(cwd, &["pull"])?;
        Ok(())
    }

    pub fn fetch(&self, cwd: &Path) -> Result<()> {
        self.run(cwd, &["fetch"])?;
        Ok(())
    }

    /// `git remote prune origin`.
    pub fn prune_remote(&self, cwd: &Path) -> Result<()> {
        self.run(cwd, &["remote", "prune", "origin"])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn failed_command_reports_cwd_and_output() {
        let temp = TempDir::new().expect("tempdir");
        let gateway = Gateway::new();
        let err = gateway
            .run(temp.path(), &["rev-parse", "--verify", "HEAD"])
            .expect_err("not a repo");
        match err {
            Error::GitFailed {
                cwd,
                command,
                output,
            } => {
                assert_eq!(cwd, temp.path());
                assert_eq!(command, "git rev-parse --verify HEAD");
                assert!(!output.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn journal_records_every_call_even_failures() {
        let temp = TempDir::new().expect("tempdir");
        let gateway = Gateway::new();
        let _ = gateway.run(temp.path(), &["status"]);
        gateway.run(temp.path(), &["--version"]).expect("version");

        let journal = gateway.journal();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal.count("status"), 1);
        assert_eq!(journal.calls_in(temp.path()).len(), 2);
        assert_eq!(journal.counts().get("--version"), Some(&1));
    }

    #[test]
    fn clones_share_the_journal() {
        let temp = TempDir::new().expect("tempdir");
        let gateway = Gateway::new();
        let other = gateway.clone();
        other.run(temp.path(), &["--version"]).expect("version");
        assert_eq!(gateway.journal().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_reach_git_unchanged() {
        use std::os::unix::ffi::OsStrExt;

        let temp = TempDir::new().expect("tempdir");
        let gateway = Gateway::new();
        let remote = temp.path().join(OsStr::from_bytes(b"remote-\xff"));
        let clone = temp.path().join(OsStr::from_bytes(b"clone-\xfe"));
        gateway
            .init_bare(temp.path(), &remote, "master")
            .expect("init bare");
        gateway
            .clone_repo(temp.path(), &remote, &clone)
            .expect("clone");

        assert!(remote.join("HEAD").is_file());
        assert!(clone.join(".git").is_dir());
    }

    #[test]
    fn missing_program_is_an_operation_failure() {
        let temp = TempDir::new().expect("tempdir");
        let gateway = Gateway::with_program("definitely-not-a-git-binary");
        let err = gateway.run(temp.path(), &["status"]).expect_err("missing");
        assert!(matches!(err, Error::OperationFailed(_)));
    }
}
