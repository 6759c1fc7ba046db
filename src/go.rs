use crate::timer::Timer;
use serde::{Deserialize, Serialize};

/// Minimum time the car must sit in READY before a go confirmation
/// counts.
pub const GO_COUNTDOWN_MS: u64 = 5_000;

/// Tolerance for brake pressure to rise after the EBS is armed.
pub const EBS_ARMED_TOLERANCE_MS: u64 = 1_000;

/// Tolerance for brake pressure to fall after launch.
pub const EBS_RELEASED_TOLERANCE_MS: u64 = 1_000;

/// Driver-confirmation timing state for the READY -> DRIVING handover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoState {
    countdown: Timer,
    pub ebs_armed_tolerance: Timer,
    pub ebs_released_tolerance: Timer,
    /// Sticky within READY; cleared on (re-)entry.
    pub confirmed: bool,
}

impl GoState {
    pub fn new() -> Self {
        Self {
            countdown: Timer::new(GO_COUNTDOWN_MS),
            ebs_armed_tolerance: Timer::new(EBS_ARMED_TOLERANCE_MS),
            ebs_released_tolerance: Timer::new(EBS_RELEASED_TOLERANCE_MS),
            confirmed: false,
        }
    }

    /// Called on entry to READY: arm the countdown, clear confirmation,
    /// and start the pressure-rise tolerance window.
    pub fn enter_ready(&mut self, now: u64) {
        self.countdown.arm(now);
        self.confirmed = false;
        self.ebs_armed_tolerance.arm(now);
    }

    /// A remote go confirmation arrived.
    ///
    /// The countdown check is destructive: a confirmation after the
    /// countdown elapsed restarts it, so an immediately repeated
    /// confirmation clears the flag again. That flicker is the shipped
    /// contract; callers sample `confirmed` in the same cycle.
    pub fn on_go(&mut self, now: u64) {
        if self.countdown.check_restart(now) {
            self.confirmed = true;
        } else {
            self.confirmed = false;
        }
    }

    /// Called when READY is left, on any exit edge.
    pub fn leave_ready(&mut self, now: u64) {
        self.ebs_released_tolerance.arm(now);
    }
}

impl Default for GoState {
    fn default() -> Self {
        Self::new()
    }
}
