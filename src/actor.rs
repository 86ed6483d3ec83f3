//! Actor identity.
//!
//! An actor is one simulated developer. Its name doubles as its git identity
//! and as the size of its simulated work: every commit costs one quantum per
//! character of the name.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::timing::Timing;

/// Email domain used for actor identities.
const IDENTITY_DOMAIN: &str = "play";

/// A simulated developer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    name: String,
    timing: Timing,
}

impl Actor {
    /// Create an actor. Names must be non-empty after trimming.
    pub fn new(name: &str, timing: Timing) -> Result<Self> {
        let name = non_empty(Some(name))
            .ok_or_else(|| Error::InvalidArgument("actor name cannot be empty".to_string()))?;
        Ok(Self {
            name: name.to_string(),
            timing,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Email recorded in the actor's clone configuration.
    pub fn email(&self) -> String {
        format!("{}@{}", self.name, IDENTITY_DOMAIN)
    }

    /// Simulated time spent producing one commit.
    pub fn work_delay(&self) -> Duration {
        self.timing.delay(Timing::units_for(&self.name))
    }

    /// Suspend for one unit of simulated work.
    pub async fn work(&self) {
        crate::timing::sleep_or_yield(self.work_delay()).await;
    }
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
