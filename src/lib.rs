//! mergeplay - Concurrent Developer Workflow Simulator
//!
//! This library drives several simulated developers against one shared Git
//! remote at once, to observe how concurrent branch integration behaves
//! under different pre-merge policies and timings.
//!
//! # Core Concepts
//!
//! - **Timing model**: work is measured in units, delays are units times a quantum
//! - **Workflow tasks**: clone, branch, timed commits, pre-merge, merge, cleanup
//! - **Lanes**: tasks in a lane run in order; lanes run concurrently
//! - **Pre-merge strategies**: merge as-is, or rebase and force-push with lease
//! - **Remote observer**: a view clone refreshed after every push
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration and scenario loading from `mergeplay.toml`
//! - `error`: Error types and result aliases
//! - `git`: Gateway over the git executable, with a call journal
//! - `inspect`: Read-only libgit2 inspection of the shared remote
//! - `timing`, `actor`, `feature`: the data model
//! - `strategy`: Pre-merge strategies
//! - `workflow`: The per-task state machine
//! - `lane`: Lanes and the sequential composer
//! - `observer`: Remote view refreshes and the presentation task
//! - `scenario`: Scenario definition and the orchestrator
//! - `events`, `output`: JSONL events and report rendering

pub mod actor;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod feature;
pub mod git;
pub mod inspect;
pub mod lane;
pub mod observer;
pub mod output;
pub mod scenario;
pub mod strategy;
pub mod timing;
pub mod workflow;

pub use error::{Error, Result};
