//! Command-line interface for mergeplay
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

mod run;
mod scenario;

/// mergeplay - concurrent developer workflow simulator
///
/// Several simulated developers branch from, commit to and merge back into
/// one shared Git remote at the same time, with or without rebasing first.
#[derive(Parser, Debug)]
#[command(name = "mergeplay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Scenario/config file (defaults to ./mergeplay.toml when present)
    #[arg(long, global = true, env = "MERGEPLAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output (captured git output)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write JSONL events to a file, or "-" for stdout
    #[arg(long, global = true, env = "MERGEPLAY_EVENTS")]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario against a fresh shared remote
    Run {
        /// Directory to play in (defaults to a new temporary directory)
        #[arg(long, env = "MERGEPLAY_PLAY_DIR")]
        play_dir: Option<PathBuf>,

        /// Name of the shared bare repository inside the play dir
        #[arg(long)]
        repo_name: Option<String>,

        /// Length of one timing quantum, in seconds
        #[arg(long)]
        quantum: Option<f64>,

        /// Pre-merge strategy: rebase or none
        #[arg(long, conflicts_with = "no_rebase")]
        strategy: Option<String>,

        /// Shorthand for --strategy none
        #[arg(long)]
        no_rebase: bool,

        /// Observer interaction: timed or manual
        #[arg(long)]
        interaction: Option<String>,

        /// Timed pause after each view refresh, in quanta
        #[arg(long)]
        delay_quanta: Option<f64>,

        /// Viewer to keep open on the observed clone (e.g. "gitk --all")
        #[arg(long)]
        viewer: Option<String>,

        /// Terminate the viewer when the scenario finishes
        #[arg(long, requires = "viewer")]
        kill_viewer: bool,

        /// Cancel remaining lanes as soon as one lane fails
        #[arg(long)]
        fail_fast: bool,

        /// Remove the temporary play dir after the run
        #[arg(long, conflicts_with = "play_dir")]
        cleanup: bool,
    },

    /// Print the effective scenario without running it
    Scenario,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let events_to_stdout = self
            .events
            .as_deref()
            .map(|value| value.trim() == "-")
            .unwrap_or(false);
        let json = self.json && !events_to_stdout;

        match self.command {
            Commands::Run {
                play_dir,
                repo_name,
                quantum,
                strategy,
                no_rebase,
                interaction,
                delay_quanta,
                viewer,
                kill_viewer,
                fail_fast,
                cleanup,
            } => run::run(run::RunOptions {
                config: self.config,
                play_dir,
                repo_name,
                quantum,
                strategy,
                no_rebase,
                interaction,
                delay_quanta,
                viewer,
                kill_viewer,
                fail_fast,
                cleanup,
                events: self.events,
                json,
                quiet: self.quiet,
            }),
            Commands::Scenario => scenario::run(scenario::ScenarioOptions {
                config: self.config,
                json,
                quiet: self.quiet,
            }),
        }
    }
}
