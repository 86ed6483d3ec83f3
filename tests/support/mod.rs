#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use mergeplay::error::Result;
use mergeplay::events::EventBus;
use mergeplay::git::Gateway;
use mergeplay::scenario::{LaneSpec, Orchestrator, ScenarioReport, ScenarioSettings, ScenarioSpec, TaskSpec};
use mergeplay::strategy::PreMergeStrategy;
use mergeplay::timing::Timing;
use tempfile::TempDir;
use uuid::Uuid;

/// A scratch play directory with fast timing.
pub struct Play {
    dir: TempDir,
    pub gateway: Gateway,
}

impl Play {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
            gateway: Gateway::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn play_dir(&self) -> PathBuf {
        self.dir.path().join("play")
    }

    /// Settings with a 10ms quantum and the given strategy.
    pub fn settings(&self, strategy: PreMergeStrategy) -> ScenarioSettings {
        let mut settings =
            ScenarioSettings::new(self.play_dir(), Timing::new(Duration::from_millis(10)));
        settings.strategy = strategy;
        settings
    }

    pub fn run(&self, settings: ScenarioSettings, scenario: ScenarioSpec) -> Result<ScenarioReport> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime")
            .block_on(
                Orchestrator::new(settings, scenario, EventBus::disabled(Uuid::new_v4()))
                    .with_gateway(self.gateway.clone())
                    .run(),
            )
    }

    pub fn workdir(&self, actor: &str, feature: &str) -> PathBuf {
        self.play_dir().join(format!("{actor}--{feature}"))
    }

    /// Position of the first journal entry satisfying `pred`.
    pub fn first_call(&self, pred: impl Fn(&mergeplay::git::GitCall) -> bool) -> Option<usize> {
        self.gateway.journal().calls().iter().position(pred)
    }

    /// Position of the last journal entry satisfying `pred`.
    pub fn last_call(&self, pred: impl Fn(&mergeplay::git::GitCall) -> bool) -> Option<usize> {
        self.gateway.journal().calls().iter().rposition(pred)
    }
}

/// A `git` stand-in that fails any call carrying `token` as an argument and
/// forwards everything else to the real git.
#[cfg(unix)]
pub fn rejecting_git(dir: &Path, token: &str) -> Gateway {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join(format!("git-rejecting{}", token.replace('-', "_")));
    let body = format!(
        "#!/bin/sh\nfor arg in \"$@\"; do\n  if [ \"$arg\" = \"{token}\" ]; then\n    echo \"rejected: git $*\" >&2\n    exit 1\n  fi\ndone\nexec git \"$@\"\n"
    );
    std::fs::write(&script, body).expect("write git wrapper");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("chmod git wrapper");
    Gateway::with_program(script)
}

pub fn single(actor: &str, feature: &str, commits: u32) -> LaneSpec {
    LaneSpec::single(TaskSpec::new(actor, feature, commits))
}

pub fn scenario(lanes: Vec<LaneSpec>) -> ScenarioSpec {
    ScenarioSpec { lanes }
}

pub fn git_stdout(repo: &Path, args: &[&str]) -> String {
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
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
