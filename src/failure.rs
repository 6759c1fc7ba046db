use crate::timer::Timer;
use serde::{Deserialize, Serialize};

/// Liveness timeout per monitored source, milliseconds.
pub const DI_TIMEOUT_MS: u64 = 500;
pub const STEERING_TIMEOUT_MS: u64 = 500;
pub const INVERTER_TIMEOUT_MS: u64 = 500;
pub const RES_TIMEOUT_MS: u64 = 1000;

/// Tractive-system voltage hysteresis windows. The asymmetry is
/// deliberate: de-energize fast, declare energized slowly.
pub const TS_OFF_DELAY_MS: u64 = 150;
pub const TS_ON_DELAY_MS: u64 = 1000;

/// Raw inverter reading corresponding to 60 V on the DC bus.
pub const TS_VOLTAGE_THRESHOLD_RAW: u16 = 0x0A30;

pub const SOURCE_COUNT: usize = 4;

/// External sources monitored for liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    /// Driver-interface computer (mission planner / perception stack).
    DriverInterface,
    SteeringActuator,
    Inverter,
    /// Remote emergency-stop receiver.
    Res,
}

impl Source {
    pub const ALL: [Source; SOURCE_COUNT] = [
        Source::DriverInterface,
        Source::SteeringActuator,
        Source::Inverter,
        Source::Res,
    ];

    const fn index(self) -> usize {
        match self {
            Source::DriverInterface => 0,
            Source::SteeringActuator => 1,
            Source::Inverter => 2,
            Source::Res => 3,
        }
    }

    const fn timeout_ms(self) -> u64 {
        match self {
            Source::DriverInterface => DI_TIMEOUT_MS,
            Source::SteeringActuator => STEERING_TIMEOUT_MS,
            Source::Inverter => INVERTER_TIMEOUT_MS,
            Source::Res => RES_TIMEOUT_MS,
        }
    }
}

/// Aggregated liveness and failure state for all monitored sources, plus
/// the tractive-system voltage hysteresis.
///
/// Lives inside the vehicle snapshot: the receive path re-arms liveness
/// timers and feeds voltage readings, the decision loop only queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDetector {
    liveness: [Timer; SOURCE_COUNT],
    /// Sticky. Set by an asserted emergency signal, cleared only by the
    /// ASATS confirmation during checkup.
    pub emergency_latch: bool,
    /// Sticky output of the voltage hysteresis.
    pub ts_energized: bool,
    ts_hold: Timer,
    ts_drop: Timer,
    pub link_quality: u8,
    pub dc_voltage_raw: u16,
}

impl FailureDetector {
    /// All liveness timers start armed at `now`: a source is granted one
    /// full timeout window before it can be declared dead.
    pub fn new(now: u64) -> Self {
        let mut liveness = [
            Timer::new(DI_TIMEOUT_MS),
            Timer::new(STEERING_TIMEOUT_MS),
            Timer::new(INVERTER_TIMEOUT_MS),
            Timer::new(RES_TIMEOUT_MS),
        ];
        for timer in &mut liveness {
            timer.arm(now);
        }

        let mut ts_hold = Timer::new(TS_ON_DELAY_MS);
        let mut ts_drop = Timer::new(TS_OFF_DELAY_MS);
        ts_hold.arm(now);
        ts_drop.arm(now);

        Self {
            liveness,
            emergency_latch: false,
            ts_energized: false,
            ts_hold,
            ts_drop,
            link_quality: 0,
            dc_voltage_raw: 0,
        }
    }

    /// Record a liveness signal for `source`, restarting its countdown.
    pub fn note_alive(&mut self, source: Source, now: u64) {
        self.liveness[source.index()].arm(now);
    }

    pub fn is_dead(&self, source: Source, now: u64) -> bool {
        self.liveness[source.index()].expired(now)
    }

    /// Logical OR across all sources, recomputed on demand.
    pub fn any_dead(&self, now: u64) -> bool {
        Source::ALL.iter().any(|s| self.is_dead(*s, now))
    }

    pub fn dead_sources(&self, now: u64) -> [bool; SOURCE_COUNT] {
        let mut dead = [false; SOURCE_COUNT];
        for source in Source::ALL {
            dead[source.index()] = self.is_dead(source, now);
        }
        dead
    }

    pub fn source_timeout_ms(source: Source) -> u64 {
        source.timeout_ms()
    }

    /// Feed one raw DC-bus voltage reading into the hysteresis.
    ///
    /// Below threshold the hold timer is continuously re-armed while the
    /// drop timer runs; after `TS_OFF_DELAY_MS` without a recovery the
    /// energized flag clears. At or above threshold the roles swap and
    /// the flag sets only after `TS_ON_DELAY_MS` of sustained voltage.
    pub fn update_dc_voltage(&mut self, raw: u16, now: u64) {
        self.dc_voltage_raw = raw;
        if raw >= TS_VOLTAGE_THRESHOLD_RAW {
            self.ts_drop.arm(now);
            if self.ts_hold.expired(now) {
                self.ts_energized = true;
            }
        } else {
            self.ts_hold.arm(now);
            if self.ts_drop.expired(now) {
                self.ts_energized = false;
            }
        }
    }

    pub fn latch_emergency(&mut self) {
        self.emergency_latch = true;
    }

    /// Explicit re-arm path: only the ASATS confirmation clears the latch.
    pub fn clear_emergency_latch(&mut self) {
        self.emergency_latch = false;
    }
}
