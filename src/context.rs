//! Explicit per-scenario context.
//!
//! Everything a workflow task needs is reached through [`PlayContext`]
//! instead of process-wide state (current directory, globals), so several
//! scenarios can run side by side in one process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::events::EventBus;
use crate::git::Gateway;
use crate::observer::RemoteObserver;
use crate::strategy::PreMergeStrategy;
use crate::timing::Timing;

#[derive(Debug, Clone)]
pub struct PlayContext {
    /// Directory holding the remote, the view clone and every task clone.
    pub play_dir: PathBuf,
    /// The shared bare repository.
    pub remote: PathBuf,
    pub gateway: Gateway,
    pub timing: Timing,
    pub strategy: PreMergeStrategy,
    pub observer: Arc<RemoteObserver>,
    pub events: EventBus,
}

impl PlayContext {
    /// Private clone directory of one (actor, feature) pair.
    pub fn workdir_for(&self, actor: &str, feature: &str) -> PathBuf {
        task_workdir(&self.play_dir, actor, feature)
    }
}

/// `<play_dir>/<actor>--<feature>`.
pub fn task_workdir(play_dir: &Path, actor: &str, feature: &str) -> PathBuf {
    play_dir.join(format!("{actor}--{feature}"))
}
