use serde::{Deserialize, Serialize};

/// Millisecond countdown timer over an externally supplied monotonic clock.
///
/// The core never reads wall-clock time itself; every check takes the
/// caller's `now_ms`. A disarmed timer reports not-expired until armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    period_ms: u64,
    deadline: Option<u64>,
}

impl Timer {
    pub const fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            deadline: None,
        }
    }

    /// Start (or restart) the countdown from `now`.
    pub fn arm(&mut self, now: u64) {
        self.deadline = Some(now.saturating_add(self.period_ms));
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Non-destructive check.
    pub fn expired(&self, now: u64) -> bool {
        match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// Destructive check: if the countdown has elapsed, re-arm it from
    /// `now` and report true. Callers that rely on the auto-restart do so
    /// deliberately (see the go-confirmation logic).
    pub fn check_restart(&mut self, now: u64) -> bool {
        if self.expired(now) {
            self.arm(now);
            true
        } else {
            false
        }
    }

    /// Milliseconds until expiry, zero if expired, `period_ms` if disarmed.
    pub fn remaining(&self, now: u64) -> u64 {
        match self.deadline {
            Some(deadline) => deadline.saturating_sub(now),
            None => self.period_ms,
        }
    }

    pub const fn period_ms(&self) -> u64 {
        self.period_ms
    }
}
