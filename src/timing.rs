//! Timing model for simulated work.
//!
//! Every delay in a scenario is expressed as a number of units multiplied by
//! a single quantum. Units usually come from the length of a name (an actor
//! name for commit work, a branch name for the merge decision), so longer
//! names mean slower actors.

use std::time::Duration;

/// Default quantum used when nothing else is configured.
pub const DEFAULT_QUANTUM: Duration = Duration::from_millis(100);

/// Maps abstract work units to suspension delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    quantum: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self::new(DEFAULT_QUANTUM)
    }
}

impl Timing {
    pub fn new(quantum: Duration) -> Self {
        Self { quantum }
    }

    /// Build from a quantum in seconds. Negative or non-finite values are rejected.
    pub fn from_secs_f64(secs: f64) -> crate::error::Result<Self> {
        Duration::try_from_secs_f64(secs)
            .map(Self::new)
            .map_err(|_| {
                crate::error::Error::InvalidArgument(format!(
                    "quantum must be a finite, non-negative number of seconds (got {secs})"
                ))
            })
    }

    pub fn quantum(&self) -> Duration {
        self.quantum
    }

    /// Delay for `units` quanta. Saturates instead of overflowing.
    pub fn delay(&self, units: u64) -> Duration {
        let units = u32::try_from(units).unwrap_or(u32::MAX);
        self.quantum.saturating_mul(units)
    }

    /// Delay for a fractional number of quanta (observer cadence uses 1.5).
    /// Saturates at `Duration::MAX`.
    pub fn scaled(&self, factor: f64) -> Duration {
        if !factor.is_finite() || factor <= 0.0 {
            return Duration::ZERO;
        }
        self.try_scaled(factor).unwrap_or(Duration::MAX)
    }

    /// Like [`Timing::scaled`], but `None` when the delay does not fit a `Duration`.
    pub fn try_scaled(&self, factor: f64) -> Option<Duration> {
        if !factor.is_finite() || factor < 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(self.quantum.as_secs_f64() * factor).ok()
    }

    /// Units derived from a name: one quantum per character.
    pub fn units_for(name: &str) -> u64 {
        name.chars().count() as u64
    }

    /// Suspend the current task for `units` quanta.
    ///
    /// A zero delay still yields once so that other lanes get a turn.
    pub async fn pause(&self, units: u64) {
        sleep_or_yield(self.delay(units)).await;
    }
}

/// Sleep for `delay`, or yield to the scheduler when it is zero.
pub async fn sleep_or_yield(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}
