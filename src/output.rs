use crate::io::Outputs;
use crate::protocol::{
    encode_asms, encode_diag, encode_ebs_status, encode_mission, encode_soc, encode_state,
    encode_wheel_rpm, Frame,
};
use crate::snapshot::{AsState, CheckupStep, Mission, Snapshot};
use heapless::Vec;

/// Telemetry emission periods, in decision cycles.
pub const STATE_PERIOD_CYCLES: u32 = 40;
pub const MISSION_PERIOD_CYCLES: u32 = 50;

/// Front hydraulic pressure band within which the brake light is lit,
/// raw sensor units.
pub const BRAKE_LIGHT_ON_RAW: u16 = 30;
pub const BRAKE_LIGHT_MAX_RAW: u16 = 2000;

pub const MAX_FRAMES_PER_CYCLE: usize = 10;

pub type FrameBatch = Vec<Frame, MAX_FRAMES_PER_CYCLE>;

/// Drives physical indicators as pure functions of the working snapshot
/// and rate-limits outbound telemetry.
#[derive(Debug)]
pub struct OutputCoordinator {
    cycle: u32,
    last_diag_key: Option<(AsState, CheckupStep, Mission)>,
}

impl OutputCoordinator {
    pub fn new() -> Self {
        Self {
            cycle: 0,
            last_diag_key: None,
        }
    }

    /// Run once per decision cycle. Returns the frames due this cycle.
    pub fn update(&mut self, snap: &Snapshot, now: u64, io: &mut dyn Outputs) -> FrameBatch {
        self.drive_indicators(snap, io);

        let mut frames = FrameBatch::new();

        if self.cycle % STATE_PERIOD_CYCLES == 0 {
            let _ = frames.push(encode_state(snap));
            let _ = frames.push(encode_soc(snap));
            let _ = frames.push(encode_asms(snap));
            for frame in encode_wheel_rpm(snap) {
                let _ = frames.push(frame);
            }
            let _ = frames.push(encode_ebs_status(snap));
        }
        if self.cycle % MISSION_PERIOD_CYCLES == 0 {
            let _ = frames.push(encode_mission(snap));
        }

        // The diagnostic record goes out only when something it reports
        // actually changed.
        let diag_key = (snap.as_state, snap.checkup_step, snap.mission);
        if self.last_diag_key != Some(diag_key) {
            self.last_diag_key = Some(diag_key);
            for frame in encode_diag(snap, now) {
                let _ = frames.push(frame);
            }
        }

        self.cycle = self.cycle.wrapping_add(1);
        frames
    }

    fn drive_indicators(&self, snap: &Snapshot, io: &mut dyn Outputs) {
        let pressure = snap.brake_pressure_front;
        io.set_brake_light(
            pressure >= BRAKE_LIGHT_ON_RAW && pressure <= BRAKE_LIGHT_MAX_RAW,
        );
        io.set_sdc_fault_led(!snap.sdc_closed());
        io.set_as_driving_indicator(snap.as_state == AsState::Driving);
    }
}

impl Default for OutputCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
