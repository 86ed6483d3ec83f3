//! Lanes and the sequential composer.
//!
//! A lane is the unit of scheduling: lanes run concurrently with each other,
//! tasks inside a lane run strictly in order. A failed task ends its lane;
//! the tasks after it never start. Sibling lanes are not affected here; the
//! scenario's aggregation policy decides that.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::context::PlayContext;
use crate::workflow::{TaskReport, WorkflowTask};

/// Reports flow out of lanes as soon as each task finishes, so tasks that
/// completed before a lane was aborted are still accounted for.
pub type ReportSender = UnboundedSender<(usize, TaskReport)>;

/// One unit of scheduling.
#[derive(Debug, Clone)]
pub enum Lane {
    /// A single independent task.
    Single(WorkflowTask),
    /// Tasks run one after another by the same lane.
    Sequence(Vec<WorkflowTask>),
}

/// How a lane ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneStatus {
    /// Every task reached `Done`.
    Done,
    /// A task failed; later tasks were skipped.
    Failed,
    /// The lane was cancelled by the scenario before it finished.
    Aborted,
}

impl Lane {
    /// Build a lane from tasks: one task is a single lane, more is a sequence.
    pub fn from_tasks(mut tasks: Vec<WorkflowTask>) -> Self {
        if tasks.len() == 1 {
            Lane::Single(tasks.remove(0))
        } else {
            Lane::Sequence(tasks)
        }
    }

    pub fn tasks(&self) -> &[WorkflowTask] {
        match self {
            Lane::Single(task) => std::slice::from_ref(task),
            Lane::Sequence(tasks) => tasks,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Lane::Single(_) => "single",
            Lane::Sequence(_) => "sequence",
        }
    }

    /// Run the lane, sending each task report tagged with `index`.
    pub async fn run(&self, index: usize, ctx: &PlayContext, reports: &ReportSender) -> LaneStatus {
        match self {
            Lane::Single(task) => {
                let report = task.run(ctx).await;
                let status = status_of(&report);
                let _ = reports.send((index, report));
                status
            }
            Lane::Sequence(tasks) => in_sequence(tasks, index, ctx, reports).await,
        }
    }
}

/// Run `tasks` one at a time, each awaited to a terminal state before the
/// next starts. Stops at the first failure.
pub async fn in_sequence(
    tasks: &[WorkflowTask],
    index: usize,
    ctx: &PlayContext,
    reports: &ReportSender,
) -> LaneStatus {
    for (position, task) in tasks.iter().enumerate() {
        let report = task.run(ctx).await;
        let status = status_of(&report);
        let _ = reports.send((index, report));
        if status == LaneStatus::Failed {
            let skipped = tasks.len() - position - 1;
            if skipped > 0 {
                tracing::warn!(lane = index, skipped, "lane stopped after failure");
            }
            return LaneStatus::Failed;
        }
    }
    LaneStatus::Done
}

fn status_of(report: &TaskReport) -> LaneStatus {
    if report.is_done() {
        LaneStatus::Done
    } else {
        LaneStatus::Failed
    }
}
