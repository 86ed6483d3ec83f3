//! Event output for external integrations.
//!
//! Events are emitted as JSON lines to stdout or a configured file. Every
//! event of one scenario carries the same run id.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};

pub const EVENT_SCHEMA_VERSION: &str = "mergeplay.event.v1";

#[derive(Debug, Clone)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

/// High-level event kinds emitted during a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ScenarioStarted,
    TaskStateChanged,
    TaskFailed,
    ViewRefreshed,
    LaneFinished,
    ScenarioFinished,
}

/// A structured event with optional payload.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub schema_version: &'static str,
    pub event: EventKind,
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Event {
    /// Build a new event with an optional payload.
    pub fn new(run_id: Uuid, event: EventKind, actor: Option<String>) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION,
            event,
            timestamp: Utc::now(),
            run_id,
            actor,
            data: None,
        }
    }

    /// Attach a serializable payload to the event.
    pub fn with_data<T: Serialize>(mut self, data: T) -> Result<Self> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }
}

/// Event sink that writes JSONL output to a destination.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl EventSink {
    /// Emit events to stdout.
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Emit events to a file, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    /// Write a single event as JSONL.
    pub fn emit(&mut self, event: &Event) -> Result<()> {
        let serialized = serde_json::to_vec(event)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }
}

/// Shared handle that every lane and the observer publish through.
///
/// A bus without a sink swallows events, so callers never branch on whether
/// events were requested.
#[derive(Clone)]
pub struct EventBus {
    run_id: Uuid,
    sink: Option<Arc<Mutex<EventSink>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("run_id", &self.run_id)
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}

impl EventBus {
    pub fn disabled(run_id: Uuid) -> Self {
        Self { run_id, sink: None }
    }

    pub fn new(run_id: Uuid, sink: EventSink) -> Self {
        Self {
            run_id,
            sink: Some(Arc::new(Mutex::new(sink))),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Publish an event. Write failures are logged, not propagated.
    pub fn publish<T: Serialize>(&self, kind: EventKind, actor: Option<&str>, data: T) {
        let Some(sink) = &self.sink else {
            return;
        };
        let event = match Event::new(self.run_id, kind, actor.map(str::to_string)).with_data(data)
        {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(?kind, "failed to encode event: {err}");
                return;
            }
        };
        let mut sink = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = sink.emit(&event) {
            tracing::warn!(?kind, "failed to write event: {err}");
        }
    }
}
