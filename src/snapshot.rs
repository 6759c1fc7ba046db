use crate::failure::FailureDetector;
use crate::go::GoState;
use crate::timer::Timer;
use serde::{Deserialize, Serialize};

/// Audible/visible emergency indication duration before the car may be
/// powered down.
pub const EMERGENCY_ALARM_MS: u64 = 10_000;

/// Hydraulic brake pressure considered sufficient, raw sensor units.
pub const BRAKE_PRESSURE_OK_RAW: u16 = 120;

/// Wheel speed below which the car counts as standing, RPM.
pub const STANDSTILL_RPM: f32 = 10.0;

/// Driving discipline selected before power-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mission {
    Manual,
    Acceleration,
    Skidpad,
    Autocross,
    Trackdrive,
    EbsTest,
    Inspection,
}

impl Mission {
    pub const fn code(self) -> u8 {
        match self {
            Mission::Manual => 0,
            Mission::Acceleration => 1,
            Mission::Skidpad => 2,
            Mission::Autocross => 3,
            Mission::Trackdrive => 4,
            Mission::EbsTest => 5,
            Mission::Inspection => 6,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Mission::Manual),
            1 => Some(Mission::Acceleration),
            2 => Some(Mission::Skidpad),
            3 => Some(Mission::Autocross),
            4 => Some(Mission::Trackdrive),
            5 => Some(Mission::EbsTest),
            6 => Some(Mission::Inspection),
            _ => None,
        }
    }
}

/// Top-level autonomous-system state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsState {
    Off,
    Manual,
    Ready,
    Driving,
    Finished,
    Emergency,
}

impl AsState {
    pub const fn code(self) -> u8 {
        match self {
            AsState::Off => 0,
            AsState::Manual => 1,
            AsState::Ready => 2,
            AsState::Driving => 3,
            AsState::Finished => 4,
            AsState::Emergency => 5,
        }
    }
}

/// Pre-flight validation step, mirrored into the snapshot for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckupStep {
    WaitForAsms,
    WatchdogCheck,
    CheckEbsStorage,
    CheckBrakePressure,
    WaitForAsats,
    CheckTimestamps,
    CloseSdc,
    WaitForTs,
    EbsCheck,
    Done,
}

impl CheckupStep {
    pub const fn code(self) -> u8 {
        match self {
            CheckupStep::WaitForAsms => 0,
            CheckupStep::WatchdogCheck => 1,
            CheckupStep::CheckEbsStorage => 2,
            CheckupStep::CheckBrakePressure => 3,
            CheckupStep::WaitForAsats => 4,
            CheckupStep::CheckTimestamps => 5,
            CheckupStep::CloseSdc => 6,
            CheckupStep::WaitForTs => 7,
            CheckupStep::EbsCheck => 8,
            CheckupStep::Done => 9,
        }
    }
}

/// Phase of the nested EBS actuator differential test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EbsTestPhase {
    DisableActuator2,
    CheckPressureActuator1,
    EnableActuator2DisableActuator1,
    CheckPressureActuator2,
    /// Present in the transition table but never entered; kept until the
    /// missing transition question is settled.
    CheckBothActuators,
    EnableActuator1,
}

impl EbsTestPhase {
    pub const fn code(self) -> u8 {
        match self {
            EbsTestPhase::DisableActuator2 => 0,
            EbsTestPhase::CheckPressureActuator1 => 1,
            EbsTestPhase::EnableActuator2DisableActuator1 => 2,
            EbsTestPhase::CheckPressureActuator2 => 3,
            EbsTestPhase::CheckBothActuators => 4,
            EbsTestPhase::EnableActuator1 => 5,
        }
    }
}

/// The single aggregate consumed by the decision logic each cycle.
///
/// Two instances exist at runtime: the *live* copy, written only by the
/// frame-receive path behind the supervisor's mutex, and the *working*
/// copy, refreshed from the live copy at the top of every cycle. All FSM
/// guards read the working copy only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    // Hardware readings, sampled and debounced upstream.
    pub ebs_pressure_1: bool,
    pub ebs_pressure_2: bool,
    /// AND-combined debounced value of the two pneumatic-line bits.
    pub ebs_pressure_ok: bool,
    pub asms_on: bool,
    pub asats_pressed: bool,
    pub sdc_closed_1: bool,
    pub sdc_closed_2: bool,
    /// Watchdog ready-signal input, used by the checkup self-test.
    pub watchdog_ok: bool,
    pub wheel_speed_fl: f32,
    pub wheel_speed_fr: f32,
    pub brake_pressure_front: u16,
    pub brake_pressure_rear: u16,
    pub soc_percent: u8,
    /// Inverter acknowledgements, informational only.
    pub inverter_ready: bool,
    pub drive_enabled: bool,

    pub failure: FailureDetector,
    pub go: GoState,

    pub mission: Mission,
    pub as_state: AsState,
    pub checkup_step: CheckupStep,
    pub ebs_phase: EbsTestPhase,

    // Signals written by the protocol layer.
    pub mission_finished: bool,
    pub res_triggered: bool,
    /// Edge signal: consumed (cleared in the live copy) by the per-cycle
    /// snapshot refresh.
    pub res_go: bool,

    pub emergency_alarm: Timer,
}

impl Snapshot {
    pub fn new(now: u64) -> Self {
        Self {
            ebs_pressure_1: false,
            ebs_pressure_2: false,
            ebs_pressure_ok: false,
            asms_on: false,
            asats_pressed: false,
            sdc_closed_1: false,
            sdc_closed_2: false,
            watchdog_ok: false,
            wheel_speed_fl: 0.0,
            wheel_speed_fr: 0.0,
            brake_pressure_front: 0,
            brake_pressure_rear: 0,
            soc_percent: 0,
            inverter_ready: false,
            drive_enabled: false,
            failure: FailureDetector::new(now),
            go: GoState::new(),
            mission: Mission::Manual,
            as_state: AsState::Off,
            checkup_step: CheckupStep::WaitForAsms,
            ebs_phase: EbsTestPhase::DisableActuator2,
            mission_finished: false,
            res_triggered: false,
            res_go: false,
            emergency_alarm: Timer::new(EMERGENCY_ALARM_MS),
        }
    }

    /// Both shutdown circuits closed.
    pub fn sdc_closed(&self) -> bool {
        self.sdc_closed_1 && self.sdc_closed_2
    }

    pub fn brake_pressure_ok(&self) -> bool {
        self.brake_pressure_front >= BRAKE_PRESSURE_OK_RAW
            && self.brake_pressure_rear >= BRAKE_PRESSURE_OK_RAW
    }

    pub fn standing_still(&self) -> bool {
        self.wheel_speed_fl.abs() < STANDSTILL_RPM && self.wheel_speed_fr.abs() < STANDSTILL_RPM
    }
}
