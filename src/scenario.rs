//! Scenario definition and orchestration.
//!
//! A scenario is an ordered list of lanes over one shared bare repository.
//! The orchestrator creates the remote (bare repository plus an admin clone
//! holding one seed commit), starts the presentation task, runs every lane
//! concurrently and collects the results.
//!
//! Aggregation is explicit ([`Aggregation`]): either every lane runs to the
//! end regardless of sibling failures, or the first failing lane cancels the
//! rest at their next suspension point.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::actor::Actor;
use crate::context::PlayContext;
use crate::error::{Error, Result};
use crate::events::{EventBus, EventKind};
use crate::feature::Feature;
use crate::git::Gateway;
use crate::inspect::RemoteSummary;
use crate::lane::{Lane, LaneStatus};
use crate::observer::{InteractionPolicy, Presentation, PresentationOutcome, RemoteObserver};
use crate::strategy::PreMergeStrategy;
use crate::timing::Timing;
use crate::workflow::{TaskReport, WorkflowTask};

/// Default name of the bare repository inside the play directory.
pub const DEFAULT_REPO_NAME: &str = "repo";

/// Default branch features start from and merge into.
pub const DEFAULT_BRANCH: &str = "master";

// =============================================================================
// Scenario definition
// =============================================================================

/// One task as written in a scenario file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub actor: String,
    pub feature: String,
    pub commits: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl TaskSpec {
    pub fn new(actor: &str, feature: &str, commits: u32) -> Self {
        Self {
            actor: actor.to_string(),
            feature: feature.to_string(),
            commits,
            source: None,
            destination: None,
        }
    }

    /// Resolve branches against the scenario default.
    pub fn to_feature(&self, default_branch: &str) -> Feature {
        Feature::new(
            self.feature.clone(),
            self.commits,
            self.source.as_deref().unwrap_or(default_branch),
            self.destination.as_deref().unwrap_or(default_branch),
        )
    }
}

/// One lane: a single task, or several run in sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneSpec {
    pub tasks: Vec<TaskSpec>,
}

impl LaneSpec {
    pub fn single(task: TaskSpec) -> Self {
        Self { tasks: vec![task] }
    }

    pub fn sequence(tasks: Vec<TaskSpec>) -> Self {
        Self { tasks }
    }
}

/// The lanes of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScenarioSpec {
    #[serde(default)]
    pub lanes: Vec<LaneSpec>,
}

impl ScenarioSpec {
    /// Three actors, four lanes: Bob and Crusty race with independent
    /// features while Alice does two features back to back.
    pub fn builtin() -> Self {
        Self {
            lanes: vec![
                LaneSpec::single(TaskSpec::new("Bob", "F1", 3)),
                LaneSpec::single(TaskSpec::new("Crusty", "F4", 5)),
                LaneSpec::single(TaskSpec::new("Crusty", "F5", 3)),
                LaneSpec::sequence(vec![
                    TaskSpec::new("Alice", "F2", 2),
                    TaskSpec::new("Alice", "F3", 3),
                ]),
            ],
        }
    }

    /// Structural checks. Feature names must be unique across the scenario,
    /// since each one owns the remote branch `feature/<name>`. Their format is
    /// not checked here: a bad name fails its own task at the init precondition.
    pub fn validate(&self) -> Result<()> {
        if self.lanes.is_empty() {
            return Err(Error::InvalidConfig(
                "scenario must define at least one lane".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for (index, lane) in self.lanes.iter().enumerate() {
            if lane.tasks.is_empty() {
                return Err(Error::InvalidConfig(format!("lanes[{index}] has no tasks")));
            }
            for task in &lane.tasks {
                if task.actor.trim().is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "lanes[{index}]: actor name cannot be empty"
                    )));
                }
                // One remote branch per feature name.
                if !seen.insert(task.feature.trim().to_string()) {
                    return Err(Error::InvalidConfig(format!(
                        "lanes[{index}]: feature '{}' ({}) is already claimed; feature names must be unique",
                        task.feature, task.actor
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every destination branch named by the scenario.
    pub fn destinations(&self, default_branch: &str) -> Vec<String> {
        let set: BTreeSet<String> = self
            .lanes
            .iter()
            .flat_map(|lane| lane.tasks.iter())
            .map(|task| {
                task.destination
                    .clone()
                    .unwrap_or_else(|| default_branch.to_string())
            })
            .collect();
        set.into_iter().collect()
    }

    /// Build runnable lanes. Actors are shared by name.
    pub fn build_lanes(&self, timing: Timing, default_branch: &str) -> Result<Vec<Lane>> {
        let mut actors: HashMap<String, Actor> = HashMap::new();
        let mut lanes = Vec::with_capacity(self.lanes.len());
        for lane in &self.lanes {
            let mut tasks = Vec::with_capacity(lane.tasks.len());
            for spec in &lane.tasks {
                let actor = match actors.get(spec.actor.trim()) {
                    Some(actor) => actor.clone(),
                    None => {
                        let actor = Actor::new(&spec.actor, timing)?;
                        actors.insert(actor.name().to_string(), actor.clone());
                        actor
                    }
                };
                tasks.push(WorkflowTask::new(actor, spec.to_feature(default_branch)));
            }
            lanes.push(Lane::from_tasks(tasks));
        }
        Ok(lanes)
    }
}

// =============================================================================
// Settings
// =============================================================================

/// What to do with sibling lanes when one lane fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Let every lane run to completion.
    #[default]
    WaitForAll,
    /// Cancel the remaining lanes after the first failure.
    FailFast,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::WaitForAll => f.write_str("wait_for_all"),
            Aggregation::FailFast => f.write_str("fail_fast"),
        }
    }
}

impl FromStr for Aggregation {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "wait_for_all" | "all" => Ok(Aggregation::WaitForAll),
            "fail_fast" => Ok(Aggregation::FailFast),
            _ => Err(Error::InvalidArgument(format!(
                "invalid aggregation '{s}': must be wait-for-all or fail-fast"
            ))),
        }
    }
}

/// Resolved run settings.
#[derive(Debug, Clone)]
pub struct ScenarioSettings {
    pub play_dir: PathBuf,
    pub repo_name: String,
    pub default_branch: String,
    pub timing: Timing,
    pub strategy: PreMergeStrategy,
    pub interaction: InteractionPolicy,
    pub presentation: Option<Presentation>,
    pub aggregation: Aggregation,
}

impl ScenarioSettings {
    /// Settings for unattended runs in `play_dir`.
    pub fn new(play_dir: impl Into<PathBuf>, timing: Timing) -> Self {
        Self {
            play_dir: play_dir.into(),
            repo_name: DEFAULT_REPO_NAME.to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
            timing,
            strategy: PreMergeStrategy::default(),
            interaction: InteractionPolicy::Timed(timing.scaled(1.5)),
            presentation: None,
            aggregation: Aggregation::default(),
        }
    }

    pub fn remote_path(&self) -> PathBuf {
        self.play_dir.join(&self.repo_name)
    }

    pub fn view_path(&self) -> PathBuf {
        self.play_dir.join(format!("{}-admin", self.repo_name))
    }
}

// =============================================================================
// Report
// =============================================================================

/// A task that did not reach a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct PendingTask {
    pub actor: String,
    pub feature: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LaneReport {
    pub index: usize,
    pub kind: &'static str,
    pub status: LaneStatus,
    pub tasks: Vec<TaskReport>,
    /// Tasks without a terminal report: skipped after a failure, or cut off
    /// when the lane was aborted.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub incomplete: Vec<PendingTask>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub run_id: String,
    pub play_dir: PathBuf,
    pub remote: PathBuf,
    pub view: PathBuf,
    pub strategy: PreMergeStrategy,
    pub aggregation: Aggregation,
    pub lanes: Vec<LaneReport>,
    pub remote_summary: RemoteSummary,
    pub git_calls: BTreeMap<String, usize>,
    pub refreshes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation: Option<PresentationOutcome>,
}

impl ScenarioReport {
    pub fn tasks(&self) -> impl Iterator<Item = &TaskReport> {
        self.lanes.iter().flat_map(|lane| lane.tasks.iter())
    }

    pub fn task(&self, actor: &str, feature: &str) -> Option<&TaskReport> {
        self.tasks()
            .find(|task| task.actor == actor && task.feature == feature)
    }

    pub fn failures(&self) -> Vec<&TaskReport> {
        self.tasks().filter(|task| task.is_failed()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.lanes.iter().all(|lane| lane.status == LaneStatus::Done)
    }

    /// Error describing an unsuccessful run, if any.
    pub fn to_error(&self) -> Option<Error> {
        if self.is_success() {
            return None;
        }
        let failures = self.failures();
        let aborted = self
            .lanes
            .iter()
            .filter(|lane| lane.status == LaneStatus::Aborted)
            .count();
        let first = failures
            .first()
            .map(|task| {
                let message = task
                    .failure
                    .as_ref()
                    .map(|failure| failure.message.as_str())
                    .unwrap_or("unknown error");
                format!("{}: {}", task.label(), message)
            })
            .unwrap_or_else(|| "lane aborted".to_string());
        Some(Error::ScenarioFailed {
            failed: failures.len() + aborted,
            first,
        })
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs one scenario against a fresh shared remote.
#[derive(Debug)]
pub struct Orchestrator {
    settings: ScenarioSettings,
    scenario: ScenarioSpec,
    gateway: Gateway,
    events: EventBus,
}

impl Orchestrator {
    pub fn new(settings: ScenarioSettings, scenario: ScenarioSpec, events: EventBus) -> Self {
        Self {
            settings,
            scenario,
            gateway: Gateway::new(),
            events,
        }
    }

    /// Use a specific gateway (for example one whose journal a test inspects).
    pub fn with_gateway(mut self, gateway: Gateway) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub async fn run(self) -> Result<ScenarioReport> {
        let settings = &self.settings;
        self.scenario.validate()?;

        let remote = settings.remote_path();
        let view = settings.view_path();
        for target in [&remote, &view] {
            if target.exists() {
                return Err(Error::TargetExists(target.clone()));
            }
        }

        let lanes = self
            .scenario
            .build_lanes(settings.timing, &settings.default_branch)?;

        std::fs::create_dir_all(&settings.play_dir)?;
        self.events.publish(
            EventKind::ScenarioStarted,
            None,
            serde_json::json!({
                "play_dir": settings.play_dir.display().to_string(),
                "strategy": settings.strategy,
                "aggregation": settings.aggregation,
                "lanes": lanes.len(),
            }),
        );
        init_remote(&self.gateway, settings, &remote, &view)?;

        let observer = Arc::new(RemoteObserver::new(
            view.clone(),
            self.gateway.clone(),
            settings.interaction,
            settings.presentation.clone(),
            self.events.clone(),
        ));
        let ctx = Arc::new(PlayContext {
            play_dir: settings.play_dir.clone(),
            remote: remote.clone(),
            gateway: self.gateway.clone(),
            timing: settings.timing,
            strategy: settings.strategy,
            observer: Arc::clone(&observer),
            events: self.events.clone(),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let presenter = {
            let observer = Arc::clone(&observer);
            tokio::spawn(async move { observer.present(shutdown_rx).await })
        };

        let (lane_statuses, reports) = run_lanes(&lanes, &ctx, settings.aggregation).await?;

        let _ = shutdown_tx.send(true);
        let presentation = match presenter.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                tracing::warn!("presentation ended with an error: {err}");
                None
            }
            Err(err) => {
                tracing::warn!("presentation task did not finish cleanly: {err}");
                None
            }
        };

        let lanes = assemble(&lanes, lane_statuses, reports);
        for lane in &lanes {
            self.events.publish(
                EventKind::LaneFinished,
                None,
                serde_json::json!({ "lane": lane.index, "status": lane.status }),
            );
        }

        let destinations = self.scenario.destinations(&settings.default_branch);
        let remote_summary = RemoteSummary::read(&remote, &destinations)?;

        let report = ScenarioReport {
            run_id: self.events.run_id().to_string(),
            play_dir: settings.play_dir.clone(),
            remote,
            view,
            strategy: settings.strategy,
            aggregation: settings.aggregation,
            lanes,
            remote_summary,
            git_calls: self.gateway.journal().counts(),
            refreshes: observer.refresh_count(),
            presentation,
        };
        self.events.publish(
            EventKind::ScenarioFinished,
            None,
            serde_json::json!({
                "success": report.is_success(),
                "failures": report.failures().len(),
            }),
        );
        Ok(report)
    }
}

/// Create the bare remote and the admin clone with one seed commit.
fn init_remote(
    gateway: &Gateway,
    settings: &ScenarioSettings,
    remote: &Path,
    admin: &Path,
) -> Result<()> {
    let play_dir = &settings.play_dir;
    gateway.init_bare(play_dir, remote, &settings.default_branch)?;
    gateway.clone_repo(play_dir, remote, admin)?;
    gateway.configure_identity(admin, "admin", "admin@play")?;
    std::fs::write(admin.join("README.md"), "just some text\n")?;
    gateway.add(admin, "README.md")?;
    gateway.commit(admin, "a first commit")?;
    gateway.push_refspec(admin, &format!("HEAD:refs/heads/{}", settings.default_branch))?;
    Ok(())
}

type LaneResults = (BTreeMap<usize, LaneStatus>, Vec<(usize, TaskReport)>);

async fn run_lanes(
    lanes: &[Lane],
    ctx: &Arc<PlayContext>,
    aggregation: Aggregation,
) -> Result<LaneResults> {
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();
    let mut set = JoinSet::new();
    for (index, lane) in lanes.iter().enumerate() {
        let lane = lane.clone();
        let ctx = Arc::clone(ctx);
        let report_tx = report_tx.clone();
        set.spawn(async move {
            let status = lane.run(index, &ctx, &report_tx).await;
            (index, status)
        });
    }
    drop(report_tx);

    let mut statuses = BTreeMap::new();
    let mut panicked = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, status)) => {
                statuses.insert(index, status);
                if status == LaneStatus::Failed && aggregation == Aggregation::FailFast {
                    tracing::warn!(lane = index, "lane failed; cancelling remaining lanes");
                    set.abort_all();
                }
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => {
                tracing::error!("lane panicked: {err}");
                panicked = Some(err.to_string());
                set.abort_all();
            }
        }
    }
    if let Some(message) = panicked {
        return Err(Error::OperationFailed(format!("lane panicked: {message}")));
    }

    let mut reports = Vec::new();
    while let Ok(item) = report_rx.try_recv() {
        reports.push(item);
    }
    Ok((statuses, reports))
}

fn assemble(
    lanes: &[Lane],
    mut statuses: BTreeMap<usize, LaneStatus>,
    reports: Vec<(usize, TaskReport)>,
) -> Vec<LaneReport> {
    let mut by_lane: BTreeMap<usize, Vec<TaskReport>> = BTreeMap::new();
    for (index, report) in reports {
        by_lane.entry(index).or_default().push(report);
    }

    lanes
        .iter()
        .enumerate()
        .map(|(index, lane)| {
            let tasks = by_lane.remove(&index).unwrap_or_default();
            let incomplete = lane.tasks()[tasks.len().min(lane.tasks().len())..]
                .iter()
                .map(|task| PendingTask {
                    actor: task.actor().name().to_string(),
                    feature: task.feature().name.clone(),
                })
                .collect();
            LaneReport {
                index,
                kind: lane.kind(),
                status: statuses.remove(&index).unwrap_or(LaneStatus::Aborted),
                tasks,
                incomplete,
            }
        })
        .collect()
}
