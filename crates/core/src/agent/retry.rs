use std::time::Duration;

use backoff::backoff::Backoff;

/// Pauses never grow beyond this many units.
const MAX_PAUSE_UNITS: u32 = 3;

/// Pause before re-asking the model after a malformed reply.
///
/// The pause at attempt `n` (counting from zero) is `unit * min(n, 3)`, so
/// consecutive pauses go 0, 1, 2, 3, 3, ... units. The agent loop starts
/// the count at the current iteration, tool rounds included.
#[derive(Clone, Debug)]
pub struct RetryPause {
    unit: Duration,
    attempt: u32,
}

impl RetryPause {
    #[inline]
    pub fn new(unit: Duration) -> Self {
        Self { unit, attempt: 0 }
    }

    /// Moves the count to `attempt`.
    #[inline]
    pub fn at_attempt(mut self, attempt: usize) -> Self {
        self.attempt = u32::try_from(attempt).unwrap_or(u32::MAX);
        self
    }
}

impl Backoff for RetryPause {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        let units = self.attempt.min(MAX_PAUSE_UNITS);
        self.attempt = self.attempt.saturating_add(1);
        Some(self.unit * units)
    }
}
