//! mergeplay run command implementation
//!
//! Resolves settings (config file, then flags), prepares the play directory
//! and drives the scenario on a single-threaded runtime.

use std::path::PathBuf;

use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::events::{EventBus, EventDestination};
use crate::observer::{InteractionMode, ViewerExit};
use crate::output::{emit_partial, emit_success, scenario_human, OutputOptions};
use crate::scenario::{Aggregation, Orchestrator};

pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub play_dir: Option<PathBuf>,
    pub repo_name: Option<String>,
    pub quantum: Option<f64>,
    pub strategy: Option<String>,
    pub no_rebase: bool,
    pub interaction: Option<String>,
    pub delay_quanta: Option<f64>,
    pub viewer: Option<String>,
    pub kill_viewer: bool,
    pub fail_fast: bool,
    pub cleanup: bool,
    pub events: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

pub fn run(options: RunOptions) -> Result<()> {
    let mut config = Config::discover(options.config.as_deref())?;
    apply_overrides(&mut config, &options)?;
    let scenario = config.scenario();

    // An explicit play dir is always kept; a temporary one unless --cleanup.
    let (play_dir, temp_guard) = match options.play_dir.clone() {
        Some(dir) => (dir, None),
        None => {
            let temp = tempfile::Builder::new().prefix("mergeplay-").tempdir()?;
            if options.cleanup {
                (temp.path().to_path_buf(), Some(temp))
            } else {
                (temp.keep(), None)
            }
        }
    };
    let settings = config.settings(play_dir)?;

    let run_id = Uuid::new_v4();
    let events = match EventDestination::parse(options.events.as_deref()) {
        Some(destination) => EventBus::new(run_id, destination.open()?),
        None => EventBus::disabled(run_id),
    };

    tracing::info!(
        play_dir = %settings.play_dir.display(),
        strategy = %settings.strategy,
        aggregation = %settings.aggregation,
        "starting scenario"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(Orchestrator::new(settings, scenario, events).run())?;

    let output = OutputOptions {
        json: options.json,
        quiet: options.quiet,
    };
    let human = scenario_human(&report);
    let outcome = match report.to_error() {
        None => emit_success(output, "run", &report, Some(&human)),
        Some(err) => {
            emit_partial(output, "run", &report, Some(&human))?;
            Err(err)
        }
    };

    drop(temp_guard);
    outcome
}

fn apply_overrides(config: &mut Config, options: &RunOptions) -> Result<()> {
    if let Some(repo_name) = &options.repo_name {
        config.run.repo_name = repo_name.clone();
    }
    if let Some(quantum) = options.quantum {
        config.timing.quantum_secs = quantum;
    }
    if let Some(strategy) = &options.strategy {
        config.strategy.pre_merge = strategy.parse()?;
    }
    if options.no_rebase {
        config.strategy.pre_merge = crate::strategy::PreMergeStrategy::None;
    }
    if let Some(interaction) = &options.interaction {
        config.observer.interaction = interaction.parse::<InteractionMode>()?;
    }
    if let Some(delay) = options.delay_quanta {
        config.observer.delay_quanta = delay;
    }
    if let Some(viewer) = &options.viewer {
        config.observer.viewer = viewer.split_whitespace().map(str::to_string).collect();
    }
    if options.kill_viewer {
        config.observer.on_finish = ViewerExit::Kill;
    }
    if options.fail_fast {
        config.run.aggregation = Aggregation::FailFast;
    }
    config.check()
}
