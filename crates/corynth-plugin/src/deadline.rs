//! Wall-clock budget for collaborator calls.

use std::time::{Duration, Instant};

/// Point in time after which a handler abandons its collaborator call.
///
/// # Example
///
/// ```
/// use corynth_plugin::Deadline;
/// use std::time::Duration;
///
/// let deadline = Deadline::after(Duration::from_secs(30));
/// assert!(!deadline.is_expired());
/// assert!(deadline.remaining() <= Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Starts a deadline that expires `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// Returns the total budget.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Returns the time left, or zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    /// Returns `true` once the budget has been spent.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }
}
