//! mergeplay scenario command implementation
//!
//! Prints the lanes `mergeplay run` would execute with the same config.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};

pub struct ScenarioOptions {
    pub config: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub fn run(options: ScenarioOptions) -> Result<()> {
    let config = Config::discover(options.config.as_deref())?;
    let scenario = config.scenario();
    scenario.validate()?;

    let mut human = HumanOutput::new(format!(
        "mergeplay scenario: {} lane(s), pre-merge {}",
        scenario.lanes.len(),
        config.strategy.pre_merge
    ));
    human.push_summary("quantum", format!("{}s", config.timing.quantum_secs));
    human.push_summary("default branch", config.run.default_branch.clone());
    human.push_summary("aggregation", config.run.aggregation.to_string());
    for (index, lane) in scenario.lanes.iter().enumerate() {
        let tasks: Vec<String> = lane
            .tasks
            .iter()
            .map(|task| format!("{} {} x{}", task.actor, task.feature, task.commits))
            .collect();
        human.push_detail(format!("lane {index}: {}", tasks.join(" -> ")));
    }
    human.push_next_step("mergeplay run".to_string());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "scenario",
        &scenario,
        Some(&human),
    )
}
