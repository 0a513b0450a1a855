//! Time slices granted by the external cooperative scheduler.

use std::cell::Cell;
use std::time::Duration;

use web_time::Instant;

/// The engine polls this after every unit of work and yields once the
/// remaining time drops below its configured threshold.
pub trait Deadline {
    fn time_remaining(&self) -> Duration;
}

impl<F: Fn() -> Duration> Deadline for F {
    fn time_remaining(&self) -> Duration {
        self()
    }
}

/// Wall-clock deadline.
#[derive(Clone, Copy, Debug)]
pub struct InstantDeadline {
    end: Instant,
}

impl InstantDeadline {
    pub fn new(end: Instant) -> Self {
        Self { end }
    }

    pub fn after(budget: Duration) -> Self {
        Self::new(Instant::now() + budget)
    }
}

impl Deadline for InstantDeadline {
    fn time_remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }
}

/// Never yields.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unbounded;

impl Deadline for Unbounded {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }
}

/// Allows `per_slice` units of work, then reports no time left.
#[derive(Debug)]
pub struct StepBudget {
    per_slice: usize,
    used: Cell<usize>,
}

impl StepBudget {
    pub fn new(per_slice: usize) -> Self {
        Self {
            per_slice: per_slice.max(1),
            used: Cell::new(0),
        }
    }
}

impl Deadline for StepBudget {
    fn time_remaining(&self) -> Duration {
        let used = self.used.get() + 1;
        self.used.set(used);
        if used >= self.per_slice {
            Duration::ZERO
        } else {
            Duration::MAX
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_budget() {
        let budget = StepBudget::new(2);
        assert_eq!(budget.time_remaining(), Duration::MAX);
        assert_eq!(budget.time_remaining(), Duration::ZERO);
    }

    #[test]
    fn test_instant_deadline_expires() {
        let past = InstantDeadline::new(Instant::now());
        assert_eq!(past.time_remaining(), Duration::ZERO);
        assert!(InstantDeadline::after(Duration::from_secs(60)).time_remaining() > Duration::ZERO);
    }
}
