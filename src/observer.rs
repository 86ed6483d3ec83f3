//! Remote observer.
//!
//! The observer owns a dedicated clone of the shared remote (the view). Tasks
//! call [`RemoteObserver::refresh`] after every push so the view follows the
//! remote, then the interaction policy decides how long the caller waits.
//!
//! Refreshes from different lanes can arrive interleaved. The git calls of
//! one refresh run under a lock, so two refreshes never touch the view clone
//! at the same time. The interaction wait happens after the lock is released.
//!
//! Independently, a [`Presentation`] task can keep an external viewer (for
//! example `gitk --all`) open on the view clone until the scenario signals
//! shutdown.

use std::fmt;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use crate::error::{Error, Result};
use crate::events::{EventBus, EventKind};
use crate::git::Gateway;

/// How a refresh hands control back to the task that requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionPolicy {
    /// Print guidance and block until the operator presses enter.
    ///
    /// The read is deliberately blocking: on the single-threaded scheduler
    /// the whole scenario stands still until the operator continues.
    Manual,
    /// Sleep for a fixed delay and continue.
    Timed(Duration),
}

impl InteractionPolicy {
    async fn wait(&self, view: &Path) -> Result<()> {
        match self {
            InteractionPolicy::Manual => {
                // Prompts go to stderr; stdout carries the report.
                eprintln!("pausing; inspect {}", view.display());
                tokio::task::yield_now().await;
                eprint!(">>>>>>>> press enter to continue");
                std::io::stderr().flush()?;
                let mut line = String::new();
                // EOF (no operator attached) continues immediately.
                std::io::stdin().lock().read_line(&mut line)?;
                Ok(())
            }
            InteractionPolicy::Timed(delay) => {
                tracing::debug!(view = %view.display(), ?delay, "pausing");
                crate::timing::sleep_or_yield(*delay).await;
                Ok(())
            }
        }
    }
}

/// Interaction mode as configured, before a delay is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    Manual,
    #[default]
    Timed,
}

impl FromStr for InteractionMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" => Ok(InteractionMode::Manual),
            "timed" => Ok(InteractionMode::Timed),
            _ => Err(Error::InvalidArgument(format!(
                "invalid interaction '{s}': must be timed or manual"
            ))),
        }
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionMode::Manual => f.write_str("manual"),
            InteractionMode::Timed => f.write_str("timed"),
        }
    }
}

/// What happens to the viewer process when the scenario finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerExit {
    /// Leave the viewer open for the operator.
    #[default]
    Detach,
    /// Terminate the viewer.
    Kill,
}

/// How the presentation task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PresentationOutcome {
    /// The viewer exited on its own.
    Exited { code: Option<i32> },
    /// Shutdown was signalled and the viewer was left running.
    Detached,
    /// Shutdown was signalled and the viewer was terminated.
    Killed,
}

/// External viewer kept alive next to the scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    command: Vec<String>,
    poll_interval: Duration,
    on_finish: ViewerExit,
}

impl Presentation {
    pub fn new(command: Vec<String>, poll_interval: Duration, on_finish: ViewerExit) -> Result<Self> {
        if command.first().map(|program| program.trim().is_empty()).unwrap_or(true) {
            return Err(Error::InvalidArgument(
                "viewer command cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            command,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            on_finish,
        })
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Launch the viewer in `cwd` and poll it until it exits or shutdown is signalled.
    pub async fn run(
        &self,
        cwd: &Path,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<PresentationOutcome> {
        tracing::info!(cwd = %cwd.display(), "launching viewer: {}", self.command.join(" "));
        let mut child = tokio::process::Command::new(&self.command[0])
            .args(&self.command[1..])
            .current_dir(cwd)
            .spawn()
            .map_err(|err| {
                Error::Presentation(format!("failed to launch '{}': {err}", self.command[0]))
            })?;

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            if let Some(status) = child.try_wait()? {
                tracing::info!(%status, "viewer exited");
                return Ok(PresentationOutcome::Exited {
                    code: status.code(),
                });
            }
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        match self.on_finish {
            ViewerExit::Detach => {
                tracing::info!("scenario finished; leaving viewer open");
                Ok(PresentationOutcome::Detached)
            }
            ViewerExit::Kill => {
                child.kill().await?;
                tracing::info!("scenario finished; viewer terminated");
                Ok(PresentationOutcome::Killed)
            }
        }
    }
}

/// Observation point over the shared remote.
#[derive(Debug)]
pub struct RemoteObserver {
    view: PathBuf,
    gateway: Gateway,
    policy: InteractionPolicy,
    presentation: Option<Presentation>,
    events: EventBus,
    serial: Mutex<()>,
    refreshes: AtomicUsize,
}

impl RemoteObserver {
    pub fn new(
        view: PathBuf,
        gateway: Gateway,
        policy: InteractionPolicy,
        presentation: Option<Presentation>,
        events: EventBus,
    ) -> Self {
        Self {
            view,
            gateway,
            policy,
            presentation,
            events,
            serial: Mutex::new(()),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn view(&self) -> &Path {
        &self.view
    }

    pub fn policy(&self) -> InteractionPolicy {
        self.policy
    }

    /// Completed refreshes so far.
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Fetch and prune the view clone, then apply the interaction policy.
    pub async fn refresh(&self) -> Result<()> {
        {
            let _serial = self.serial.lock().await;
            self.gateway.fetch(&self.view)?;
            self.gateway.prune_remote(&self.view)?;
            let count = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            self.events.publish(
                EventKind::ViewRefreshed,
                None,
                serde_json::json!({ "refresh": count }),
            );
        }
        self.policy.wait(&self.view).await
    }

    /// Run the presentation task, if one is configured.
    pub async fn present(&self, shutdown: watch::Receiver<bool>) -> Result<Option<PresentationOutcome>> {
        match &self.presentation {
            Some(presentation) => presentation.run(&self.view, shutdown).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_mode_parse() {
        assert_eq!("manual".parse::<InteractionMode>().unwrap(), InteractionMode::Manual);
        assert_eq!(" Timed ".parse::<InteractionMode>().unwrap(), InteractionMode::Timed);
        assert!("sometimes".parse::<InteractionMode>().is_err());
    }

    #[test]
    fn empty_viewer_rejected() {
        assert!(Presentation::new(Vec::new(), Duration::from_secs(1), ViewerExit::Detach).is_err());
        assert!(Presentation::new(vec![" ".to_string()], Duration::from_secs(1), ViewerExit::Kill).is_err());
    }

    #[tokio::test]
    async fn presentation_reports_natural_exit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let presentation = Presentation::new(
            vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()],
            Duration::from_millis(5),
            ViewerExit::Detach,
        )
        .expect("presentation");
        let (_tx, rx) = watch::channel(false);
        let outcome = presentation.run(dir.path(), rx).await.expect("run");
        assert_eq!(outcome, PresentationOutcome::Exited { code: Some(3) });
    }

    #[tokio::test]
    async fn presentation_stops_on_shutdown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let presentation = Presentation::new(
            vec!["sleep".to_string(), "30".to_string()],
            Duration::from_millis(5),
            ViewerExit::Kill,
        )
        .expect("presentation");
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let dir = dir;
            presentation.run(dir.path(), rx).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).expect("signal");
        let outcome = handle.await.expect("join").expect("run");
        assert_eq!(outcome, PresentationOutcome::Killed);
    }

    #[tokio::test]
    async fn missing_viewer_is_a_presentation_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let presentation = Presentation::new(
            vec!["no-such-viewer-binary".to_string()],
            Duration::from_millis(5),
            ViewerExit::Detach,
        )
        .expect("presentation");
        let (_tx, rx) = watch::channel(false);
        let err = presentation.run(dir.path(), rx).await.expect_err("missing");
        assert!(matches!(err, Error::Presentation(_)));
    }
}
