use crate::snapshot::{CheckupStep, EbsTestPhase, Mission, Snapshot, BRAKE_PRESSURE_OK_RAW};
use crate::timer::Timer;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// How long the watchdog ready-signal must stay low once toggling stops.
pub const WATCHDOG_HOLD_MS: u64 = 500;

/// Window within which each EBS actuator alone must build line pressure.
pub const EBS_TEST_TOLERANCE_MS: u64 = 1_000;

const MAX_ERROR_RECORDS: usize = 16;

/// Retryable guard failure. The sequencer stays at its current step and
/// re-evaluates on the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CheckupError {
    #[error("ASMS is off")]
    AsmsOff,
    #[error("watchdog ready-signal did not go low")]
    WatchdogStillHigh,
    #[error("no EBS storage pressure")]
    NoEbsPressure,
    #[error("hydraulic brake pressure below threshold")]
    BrakePressureLow,
    #[error("waiting for ASATS confirmation")]
    AsatsNotPressed,
    #[error("monitored source dead")]
    SourceDead,
    #[error("emergency latch still set")]
    EmergencyLatched,
    #[error("cannot close SDC in manual mission")]
    ManualMission,
    #[error("tractive system not energized")]
    TsNotEnergized,
    #[error("EBS actuator did not build pressure in time")]
    EbsPressureNotBuilding,
}

impl CheckupError {
    /// Stable diagnostic code for telemetry and logs.
    pub const fn code(self) -> u8 {
        match self {
            CheckupError::AsmsOff => 0x01,
            CheckupError::WatchdogStillHigh => 0x02,
            CheckupError::NoEbsPressure => 0x03,
            CheckupError::BrakePressureLow => 0x04,
            CheckupError::AsatsNotPressed => 0x05,
            CheckupError::SourceDead => 0x06,
            CheckupError::EmergencyLatched => 0x07,
            CheckupError::ManualMission => 0x08,
            CheckupError::TsNotEnergized => 0x09,
            CheckupError::EbsPressureNotBuilding => 0x0A,
        }
    }
}

/// Physical side effects requested by one sequencer call, applied by the
/// supervisor through the I/O seam.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckupActions {
    pub watchdog_toggling: Option<bool>,
    pub close_sdc: bool,
    pub ebs1_enable: Option<bool>,
    pub ebs2_enable: Option<bool>,
    pub clear_emergency_latch: bool,
}

impl CheckupActions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn has_actions(&self) -> bool {
        self.watchdog_toggling.is_some()
            || self.close_sdc
            || self.ebs1_enable.is_some()
            || self.ebs2_enable.is_some()
            || self.clear_emergency_latch
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckupErrorRecord {
    pub error: CheckupError,
    pub step: CheckupStep,
    pub timestamp: u64,
}

/// Strictly ordered pre-flight validation FSM.
///
/// Advances at most one step per call; a failing guard returns its error
/// and leaves the step untouched. Reset together with the nested EBS
/// phase on every re-entry to OFF.
#[derive(Debug, Clone)]
pub struct CheckupSequencer {
    step: CheckupStep,
    phase: EbsTestPhase,
    wd_observing: bool,
    wd_hold: Timer,
    phase_tolerance: Timer,
    error_history: Vec<CheckupErrorRecord, MAX_ERROR_RECORDS>,
}

impl CheckupSequencer {
    pub fn new() -> Self {
        Self {
            step: CheckupStep::WaitForAsms,
            phase: EbsTestPhase::DisableActuator2,
            wd_observing: false,
            wd_hold: Timer::new(WATCHDOG_HOLD_MS),
            phase_tolerance: Timer::new(EBS_TEST_TOLERANCE_MS),
            error_history: Vec::new(),
        }
    }

    pub fn step(&self) -> CheckupStep {
        self.step
    }

    pub fn phase(&self) -> EbsTestPhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.step == CheckupStep::Done
    }

    pub fn error_history(&self) -> &[CheckupErrorRecord] {
        &self.error_history
    }

    /// Reset to the first step and the first nested phase.
    pub fn reset(&mut self) {
        self.step = CheckupStep::WaitForAsms;
        self.phase = EbsTestPhase::DisableActuator2;
        self.wd_observing = false;
        self.wd_hold.disarm();
        self.phase_tolerance.disarm();
        self.error_history.clear();
    }

    /// Evaluate the current step's guard against the working snapshot.
    pub fn advance(&mut self, snap: &Snapshot, now: u64) -> Result<CheckupActions, CheckupError> {
        let result = self.evaluate(snap, now);
        if let Err(error) = result {
            warn!(step = ?self.step, %error, "checkup guard failed");
            self.record_error(error, now);
        }
        result
    }

    fn evaluate(&mut self, snap: &Snapshot, now: u64) -> Result<CheckupActions, CheckupError> {
        let mut actions = CheckupActions::none();

        match self.step {
            CheckupStep::WaitForAsms => {
                if !snap.asms_on {
                    return Err(CheckupError::AsmsOff);
                }
                self.step = CheckupStep::WatchdogCheck;
            }
            CheckupStep::WatchdogCheck => {
                if !self.wd_observing {
                    // Stop toggling and watch the ready-signal fall.
                    actions.watchdog_toggling = Some(false);
                    self.wd_hold.arm(now);
                    self.wd_observing = true;
                    return Ok(actions);
                }
                if snap.watchdog_ok {
                    self.wd_hold.arm(now);
                    return Err(CheckupError::WatchdogStillHigh);
                }
                if self.wd_hold.expired(now) {
                    actions.watchdog_toggling = Some(true);
                    self.wd_observing = false;
                    self.step = CheckupStep::CheckEbsStorage;
                }
            }
            CheckupStep::CheckEbsStorage => {
                if !snap.ebs_pressure_ok {
                    return Err(CheckupError::NoEbsPressure);
                }
                self.step = CheckupStep::CheckBrakePressure;
            }
            CheckupStep::CheckBrakePressure => {
                if !snap.brake_pressure_ok() {
                    return Err(CheckupError::BrakePressureLow);
                }
                self.step = CheckupStep::WaitForAsats;
            }
            CheckupStep::WaitForAsats => {
                if !snap.asats_pressed {
                    return Err(CheckupError::AsatsNotPressed);
                }
                actions.clear_emergency_latch = true;
                self.step = CheckupStep::CheckTimestamps;
            }
            CheckupStep::CheckTimestamps => {
                if snap.failure.any_dead(now) {
                    return Err(CheckupError::SourceDead);
                }
                if snap.failure.emergency_latch {
                    return Err(CheckupError::EmergencyLatched);
                }
                self.step = CheckupStep::CloseSdc;
            }
            CheckupStep::CloseSdc => {
                if snap.mission == Mission::Manual {
                    return Err(CheckupError::ManualMission);
                }
                actions.close_sdc = true;
                self.step = CheckupStep::WaitForTs;
            }
            CheckupStep::WaitForTs => {
                if !snap.failure.ts_energized {
                    return Err(CheckupError::TsNotEnergized);
                }
                self.step = CheckupStep::EbsCheck;
            }
            CheckupStep::EbsCheck => {
                return self.evaluate_ebs_test(snap, now);
            }
            CheckupStep::Done => {}
        }

        Ok(actions)
    }

    /// Differential test: each actuator must hold line pressure alone.
    fn evaluate_ebs_test(
        &mut self,
        snap: &Snapshot,
        now: u64,
    ) -> Result<CheckupActions, CheckupError> {
        let mut actions = CheckupActions::none();

        match self.phase {
            EbsTestPhase::DisableActuator2 => {
                actions.ebs2_enable = Some(false);
                self.phase_tolerance.arm(now);
                self.phase = EbsTestPhase::CheckPressureActuator1;
            }
            EbsTestPhase::CheckPressureActuator1 => {
                if snap.brake_pressure_front >= BRAKE_PRESSURE_OK_RAW {
                    self.phase = EbsTestPhase::EnableActuator2DisableActuator1;
                } else if self.phase_tolerance.expired(now) {
                    return Err(CheckupError::EbsPressureNotBuilding);
                }
            }
            EbsTestPhase::EnableActuator2DisableActuator1 => {
                actions.ebs2_enable = Some(true);
                actions.ebs1_enable = Some(false);
                self.phase_tolerance.arm(now);
                self.phase = EbsTestPhase::CheckPressureActuator2;
            }
            EbsTestPhase::CheckPressureActuator2 => {
                if snap.brake_pressure_rear >= BRAKE_PRESSURE_OK_RAW {
                    self.phase = EbsTestPhase::EnableActuator1;
                } else if self.phase_tolerance.expired(now) {
                    return Err(CheckupError::EbsPressureNotBuilding);
                }
            }
            EbsTestPhase::CheckBothActuators => {
                // No transition enters this phase. Treated as a completed
                // check if it is ever wired in.
                self.phase = EbsTestPhase::EnableActuator1;
            }
            EbsTestPhase::EnableActuator1 => {
                actions.ebs1_enable = Some(true);
                self.phase = EbsTestPhase::DisableActuator2;
                self.step = CheckupStep::Done;
            }
        }

        Ok(actions)
    }

    fn record_error(&mut self, error: CheckupError, now: u64) {
        // Collapse repeats of the same error at the same step.
        if let Some(last) = self.error_history.last() {
            if last.error == error && last.step == self.step {
                return;
            }
        }
        if self.error_history.is_full() {
            self.error_history.remove(0);
        }
        let _ = self.error_history.push(CheckupErrorRecord {
            error,
            step: self.step,
            timestamp: now,
        });
    }
}

impl Default for CheckupSequencer {
    fn default() -> Self {
        Self::new()
    }
}
