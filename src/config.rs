//! Configuration loading and management
//!
//! Handles parsing of `mergeplay.toml` files: timing, strategy, observer and
//! run settings, plus an optional scenario (`[[lanes]]`). A file without
//! lanes runs the built-in scenario.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::observer::{InteractionMode, InteractionPolicy, Presentation, ViewerExit};
use crate::scenario::{Aggregation, LaneSpec, ScenarioSettings, ScenarioSpec};
use crate::strategy::PreMergeStrategy;
use crate::timing::Timing;

/// Conventional config file name.
pub const CONFIG_FILENAME: &str = "mergeplay.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub strategy: StrategyConfig,

    #[serde(default)]
    pub observer: ObserverConfig,

    #[serde(default)]
    pub run: RunConfig,

    /// Scenario lanes; empty means the built-in scenario.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lanes: Vec<LaneSpec>,
}

/// Timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Length of one quantum, in seconds
    #[serde(default = "default_quantum_secs")]
    pub quantum_secs: f64,
}

fn default_quantum_secs() -> f64 {
    crate::timing::DEFAULT_QUANTUM.as_secs_f64()
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            quantum_secs: default_quantum_secs(),
        }
    }
}

/// Pre-merge strategy configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub pre_merge: PreMergeStrategy,
}

/// Observer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverConfig {
    #[serde(default)]
    pub interaction: InteractionMode,

    /// Timed pause after each refresh, in quanta
    #[serde(default = "default_delay_quanta")]
    pub delay_quanta: f64,

    /// Viewer command line (e.g. `["gitk", "--all"]`); empty disables it
    #[serde(default)]
    pub viewer: Vec<String>,

    /// Viewer liveness poll interval, in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,

    #[serde(default)]
    pub on_finish: ViewerExit,
}

fn default_delay_quanta() -> f64 {
    1.5
}

fn default_poll_interval_secs() -> f64 {
    1.0
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            interaction: InteractionMode::default(),
            delay_quanta: default_delay_quanta(),
            viewer: Vec::new(),
            poll_interval_secs: default_poll_interval_secs(),
            on_finish: ViewerExit::default(),
        }
    }
}

/// Run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_repo_name")]
    pub repo_name: String,

    #[serde(default = "default_branch")]
    pub default_branch: String,

    #[serde(default)]
    pub aggregation: Aggregation,
}

fn default_repo_name() -> String {
    crate::scenario::DEFAULT_REPO_NAME.to_string()
}

fn default_branch() -> String {
    crate::scenario::DEFAULT_BRANCH.to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            repo_name: default_repo_name(),
            default_branch: default_branch(),
            aggregation: Aggregation::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.check()?;
        Ok(config)
    }

    /// Load `path` when given, otherwise `./mergeplay.toml` if present, otherwise defaults
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let local = PathBuf::from(CONFIG_FILENAME);
                if local.exists() {
                    Self::load(&local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The scenario to run: configured lanes, or the built-in scenario.
    pub fn scenario(&self) -> ScenarioSpec {
        if self.lanes.is_empty() {
            ScenarioSpec::builtin()
        } else {
            ScenarioSpec {
                lanes: self.lanes.clone(),
            }
        }
    }

    pub fn timing(&self) -> Result<Timing> {
        Timing::from_secs_f64(self.timing.quantum_secs)
            .map_err(|_| Error::InvalidConfig(format!(
                "timing.quantum_secs must be a non-negative number (got {})",
                self.timing.quantum_secs
            )))
    }

    pub fn interaction(&self, timing: Timing) -> InteractionPolicy {
        match self.observer.interaction {
            InteractionMode::Manual => InteractionPolicy::Manual,
            InteractionMode::Timed => InteractionPolicy::Timed(timing.scaled(self.observer.delay_quanta)),
        }
    }

    pub fn presentation(&self) -> Result<Option<Presentation>> {
        if self.observer.viewer.is_empty() {
            return Ok(None);
        }
        let poll = Duration::try_from_secs_f64(self.observer.poll_interval_secs).map_err(|_| {
            Error::InvalidConfig("observer.poll_interval_secs must be a non-negative number".to_string())
        })?;
        Presentation::new(self.observer.viewer.clone(), poll, self.observer.on_finish).map(Some)
    }

    /// Resolve run settings for `play_dir`.
    pub fn settings(&self, play_dir: PathBuf) -> Result<ScenarioSettings> {
        let timing = self.timing()?;
        Ok(ScenarioSettings {
            play_dir,
            repo_name: self.run.repo_name.clone(),
            default_branch: self.run.default_branch.clone(),
            timing,
            strategy: self.strategy.pre_merge,
            interaction: self.interaction(timing),
            presentation: self.presentation()?,
            aggregation: self.run.aggregation,
        })
    }

    /// Validate values that serde alone cannot.
    pub fn check(&self) -> Result<()> {
        let timing = self.timing()?;
        if timing.try_scaled(self.observer.delay_quanta).is_none() {
            return Err(Error::InvalidConfig(format!(
                "observer.delay_quanta must be a non-negative number small enough to form a delay (got {})",
                self.observer.delay_quanta
            )));
        }
        self.presentation()?;
        validate_name(&self.run.repo_name, "run.repo_name")?;
        validate_name(&self.run.default_branch, "run.default_branch")?;
        if !self.lanes.is_empty() {
            self.scenario().validate()?;
        }
        Ok(())
    }
}

fn validate_name(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() || value.chars().any(char::is_whitespace) {
        return Err(Error::InvalidConfig(format!(
            "{field}: '{value}' must be non-empty without whitespace"
        )));
    }
    Ok(())
}
