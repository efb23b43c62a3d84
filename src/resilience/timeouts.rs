//! Deadline enforcement.
//!
//! Every step, probe and scan runs under a [`Deadline`]; a step's own timeout
//! is clamped to whatever the enclosing plan has left.

use std::time::{Duration, Instant};

/// A fixed instant after which work is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

/// Stand-in horizon for budgets too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

impl Deadline {
    pub fn after(duration: Duration) -> Self {
        let now = Instant::now();
        Self(
            now.checked_add(duration)
                .or_else(|| now.checked_add(FAR_FUTURE))
                .unwrap_or(now),
        )
    }

    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// `timeout`, shortened to fit before the deadline.
    pub fn fit(&self, timeout: Duration) -> Duration {
        timeout.min(self.remaining())
    }

    /// The earlier of this deadline and an optional caller-supplied one.
    pub fn earliest(self, other: Option<Deadline>) -> Deadline {
        match other {
            Some(other) if other.0 < self.0 => other,
            Some(_) => self,
            None => self,
        }
    }
}
