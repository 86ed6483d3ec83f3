//! Developer workflow tasks.
//!
//! One task is one actor building one feature, start to finish:
//!
//! ```text
//! Init -> Branched -> Committing (xN) -> PreMerge -> Merging -> Finalize -> Done
//!   \________________________________________________________________/
//!                         any failure -> Failed
//! ```
//!
//! The feature name is checked before `Init`; a bad name fails the task
//! without a single git call. Nothing inside a task runs concurrently, and a
//! task's clone is never touched by another task.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::actor::Actor;
use crate::context::PlayContext;
use crate::error::{Error, Result};
use crate::events::EventKind;
use crate::feature::Feature;
use crate::strategy::PreMergeTarget;
use crate::timing::Timing;

/// States of the workflow state machine, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Init,
    Branched,
    Committing,
    PreMerge,
    Merging,
    Finalize,
    Done,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskState::Init => "init",
            TaskState::Branched => "branched",
            TaskState::Committing => "committing",
            TaskState::PreMerge => "pre_merge",
            TaskState::Merging => "merging",
            TaskState::Finalize => "finalize",
            TaskState::Done => "done",
            TaskState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Why a task ended in `Failed`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    /// Last state entered before the failure (`init` for precondition failures).
    pub state: TaskState,
    pub message: String,
    pub exit_code: i32,
    /// The failure happened before any git call.
    pub precondition: bool,
}

/// Outcome of one workflow task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub actor: String,
    pub feature: String,
    pub branch: String,
    pub workdir: PathBuf,
    /// Final state, `done` or `failed`.
    pub state: TaskState,
    /// States entered, in order (terminal state excluded).
    pub path: Vec<TaskState>,
    pub commits_planned: u32,
    pub commits_pushed: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskFailure>,
}

impl TaskReport {
    pub fn is_done(&self) -> bool {
        self.state == TaskState::Done
    }

    pub fn is_failed(&self) -> bool {
        self.state == TaskState::Failed
    }

    /// Short `actor/feature` label.
    pub fn label(&self) -> String {
        format!("{}/{}", self.actor, self.feature)
    }
}

/// One actor working one feature.
#[derive(Debug, Clone)]
pub struct WorkflowTask {
    actor: Actor,
    feature: Feature,
}

impl WorkflowTask {
    pub fn new(actor: Actor, feature: Feature) -> Self {
        Self { actor, feature }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn feature(&self) -> &Feature {
        &self.feature
    }

    /// Drive the task to a terminal state. Never returns an error: failures
    /// are recorded in the report.
    pub async fn run(&self, ctx: &PlayContext) -> TaskReport {
        let mut progress = Progress::new(self, ctx);

        if let Err(err) = self.feature.validate() {
            tracing::warn!(actor = self.actor.name(), "rejected before init: {err}");
            return progress.fail(ctx, err, true);
        }

        match self.drive(ctx, &mut progress).await {
            Ok(()) => progress.done(ctx),
            Err(err) => progress.fail(ctx, err, false),
        }
    }

    async fn drive(&self, ctx: &PlayContext, progress: &mut Progress) -> Result<()> {
        let gateway = &ctx.gateway;
        let workdir = progress.report.workdir.clone();
        let branch = self.feature.branch_name();

        progress.enter(ctx, TaskState::Init);
        gateway.clone_repo(&ctx.play_dir, &ctx.remote, &workdir)?;
        gateway.configure_identity(&workdir, self.actor.name(), &self.actor.email())?;

        progress.enter(ctx, TaskState::Branched);
        let start = format!("origin/{}", self.feature.source);
        gateway.checkout_new_branch(&workdir, &branch, &start)?;
        gateway.push_set_upstream(&workdir, &branch)?;

        if self.feature.commits > 0 {
            progress.enter(ctx, TaskState::Committing);
        }
        for index in 0..self.feature.commits {
            self.actor.work().await;
            let file = self.feature.file_name(index);
            std::fs::write(
                workdir.join(&file),
                format!("{} was here\nfeature: {}\n", self.actor.name(), self.feature.name),
            )?;
            gateway.add(&workdir, &file)?;
            gateway.commit(&workdir, &self.feature.commit_message(index))?;
            gateway.push(&workdir)?;
            progress.report.commits_pushed += 1;
            ctx.observer.refresh().await?;
        }

        progress.enter(ctx, TaskState::PreMerge);
        ctx.strategy.apply(
            gateway,
            PreMergeTarget {
                workdir: &workdir,
                source_branch: &self.feature.source,
                feature_branch: &branch,
            },
        )?;

        progress.enter(ctx, TaskState::Merging);
        ctx.timing.pause(Timing::units_for(&branch)).await;
        gateway.checkout(&workdir, &self.feature.destination)?;
        gateway.pull(&workdir)?;
        gateway.merge_no_ff(&workdir, &branch, &self.feature.merge_message())?;

        progress.enter(ctx, TaskState::Finalize);
        gateway.push(&workdir)?;
        gateway.delete_remote_branch(&workdir, &branch)?;
        ctx.observer.refresh().await?;

        Ok(())
    }
}

/// Mutable bookkeeping private to one running task.
struct Progress {
    report: TaskReport,
}

impl Progress {
    fn new(task: &WorkflowTask, ctx: &PlayContext) -> Self {
        let now = Utc::now();
        Self {
            report: TaskReport {
                actor: task.actor.name().to_string(),
                feature: task.feature.name.clone(),
                branch: task.feature.branch_name(),
                workdir: ctx.workdir_for(task.actor.name(), &task.feature.name),
                state: TaskState::Init,
                path: Vec::new(),
                commits_planned: task.feature.commits,
                commits_pushed: 0,
                started_at: now,
                finished_at: now,
                failure: None,
            },
        }
    }

    fn enter(&mut self, ctx: &PlayContext, state: TaskState) {
        tracing::info!(
            actor = %self.report.actor,
            feature = %self.report.feature,
            "{} -> {}",
            self.report.label(),
            state
        );
        self.report.state = state;
        self.report.path.push(state);
        ctx.events.publish(
            EventKind::TaskStateChanged,
            Some(&self.report.actor),
            serde_json::json!({ "feature": self.report.feature, "state": state }),
        );
    }

    fn done(mut self, ctx: &PlayContext) -> TaskReport {
        self.finish(ctx, TaskState::Done);
        self.report
    }

    fn fail(mut self, ctx: &PlayContext, err: Error, precondition: bool) -> TaskReport {
        let failure = TaskFailure {
            state: self.report.state,
            message: err.to_string(),
            exit_code: err.exit_code(),
            precondition,
        };
        tracing::warn!(
            actor = %self.report.actor,
            feature = %self.report.feature,
            state = %failure.state,
            "task failed: {}",
            failure.message
        );
        ctx.events.publish(
            EventKind::TaskFailed,
            Some(&self.report.actor),
            &failure,
        );
        self.report.failure = Some(failure);
        self.finish(ctx, TaskState::Failed);
        self.report
    }

    fn finish(&mut self, ctx: &PlayContext, state: TaskState) {
        self.report.state = state;
        self.report.finished_at = Utc::now();
        ctx.events.publish(
            EventKind::TaskStateChanged,
            Some(&self.report.actor),
            serde_json::json!({ "feature": self.report.feature, "state": state }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_ordered() {
        assert!(TaskState::Init < TaskState::Branched);
        assert!(TaskState::PreMerge < TaskState::Merging);
        assert!(TaskState::Finalize < TaskState::Done);
    }

    #[test]
    fn only_done_and_failed_are_terminal() {
        assert!(TaskState::Done.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Committing.is_terminal());
    }

    #[test]
    fn display_matches_serde_names() {
        for state in [
            TaskState::Init,
            TaskState::PreMerge,
            TaskState::Failed,
        ] {
            let json = serde_json::to_value(state).expect("serialize");
            assert_eq!(json, serde_json::Value::String(state.to_string()));
        }
    }
}
