use std::time::Duration;

/// Repeating deadline schedule. Owning the value is the registration:
/// dropping it cancels every future tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    period: Duration,
    next_due: Duration,
}

impl Interval {
    /// First tick falls one period after `now`.
    pub fn every(period: Duration, now: Duration) -> Self {
        Self {
            period,
            next_due: now + period,
        }
    }

    pub fn next_due(&self) -> Duration {
        self.next_due
    }

    /// Consumes one due tick, if any. Call repeatedly to catch up on ticks
    /// missed while the caller was busy.
    pub fn poll(&mut self, now: Duration) -> bool {
        if now >= self.next_due {
            self.next_due += self.period;
            true
        } else {
            false
        }
    }

    pub fn remaining(&self, now: Duration) -> Duration {
        self.next_due.saturating_sub(now)
    }
}
