use std::time::{Duration, Instant};

/// A one-shot timer expressed as a deadline on the monotonic clock.
///
/// Re-arming replaces the previous deadline, which is what gives the fetch
/// timer its debounce behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.at = Some(now + delay);
    }

    pub fn disarm(&mut self) {
        self.at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    pub fn at(&self) -> Option<Instant> {
        self.at
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.at, Some(at) if now >= at)
    }

    /// Disarms and returns `true` if the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.at = None;
            true
        } else {
            false
        }
    }
}

/// Earliest armed deadline among `deadlines`.
pub fn earliest<'a>(deadlines: impl IntoIterator<Item = &'a Deadline>) -> Option<Instant> {
    deadlines.into_iter().filter_map(Deadline::at).min()
}
