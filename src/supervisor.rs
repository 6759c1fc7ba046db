use crate::checkup::CheckupSequencer;
use crate::fsm;
use crate::io::Outputs;
use crate::output::{FrameBatch, OutputCoordinator};
use crate::protocol::{self, Frame};
use crate::snapshot::{AsState, Snapshot};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::info;

/// Period of the background emergency monitor task.
pub const MONITOR_PERIOD_MS: u64 = 150;

/// Outcome of one decision cycle.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub frames: FrameBatch,
    /// Set exactly once, on the first entry to OFF: the caller must spawn
    /// the background emergency monitor now.
    pub arm_monitor: bool,
    pub transition: Option<(AsState, AsState)>,
}

/// Digital/analog readings sampled and debounced by the board support
/// layer, pushed into the live snapshot between cycles.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardwareInputs {
    pub ebs_pressure_1: bool,
    pub ebs_pressure_2: bool,
    pub asms_on: bool,
    pub asats_pressed: bool,
    pub sdc_closed_1: bool,
    pub sdc_closed_2: bool,
    pub watchdog_ok: bool,
    pub wheel_speed_fl: f32,
    pub wheel_speed_fr: f32,
}

fn lock_live(live: &Mutex<Snapshot>) -> MutexGuard<'_, Snapshot> {
    match live.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Receive path: decode one inbound frame into the live snapshot.
///
/// May run at any time relative to the decision loop; the only shared
/// resource is the live snapshot and the critical section is bounded by
/// the decode itself. Undecodable frames are dropped without state
/// change.
pub fn receive_frame(live: &Mutex<Snapshot>, frame: &Frame, now: u64) {
    let mut snap = lock_live(live);
    let _ = protocol::decode_frame(&mut snap, frame, now);
}

/// Push fresh pin readings into the live snapshot.
pub fn apply_inputs(live: &Mutex<Snapshot>, inputs: &HardwareInputs) {
    let mut snap = lock_live(live);
    snap.ebs_pressure_1 = inputs.ebs_pressure_1;
    snap.ebs_pressure_2 = inputs.ebs_pressure_2;
    snap.ebs_pressure_ok = inputs.ebs_pressure_1 && inputs.ebs_pressure_2;
    snap.asms_on = inputs.asms_on;
    snap.asats_pressed = inputs.asats_pressed;
    snap.sdc_closed_1 = inputs.sdc_closed_1;
    snap.sdc_closed_2 = inputs.sdc_closed_2;
    snap.watchdog_ok = inputs.watchdog_ok;
    snap.wheel_speed_fl = inputs.wheel_speed_fl;
    snap.wheel_speed_fr = inputs.wheel_speed_fr;
}

/// Top-level orchestrator: owns the live snapshot (shared with the
/// receive path), the per-cycle working copy, and every component the
/// decision loop drives.
pub struct Supervisor {
    live: Arc<Mutex<Snapshot>>,
    working: Snapshot,
    checkup: CheckupSequencer,
    output: OutputCoordinator,
    wd_toggling: bool,
    wd_level: bool,
    monitor_armed: bool,
    res_activated: bool,
}

impl Supervisor {
    pub fn new(now: u64) -> Self {
        Self {
            live: Arc::new(Mutex::new(Snapshot::new(now))),
            working: Snapshot::new(now),
            checkup: CheckupSequencer::new(),
            output: OutputCoordinator::new(),
            wd_toggling: true,
            wd_level: false,
            monitor_armed: false,
            res_activated: false,
        }
    }

    /// Handle to the live snapshot for the receive path and the input
    /// sampler. The working copy is never exposed.
    pub fn live_handle(&self) -> Arc<Mutex<Snapshot>> {
        Arc::clone(&self.live)
    }

    pub fn working(&self) -> &Snapshot {
        &self.working
    }

    pub fn checkup(&self) -> &CheckupSequencer {
        &self.checkup
    }

    pub fn state(&self) -> AsState {
        self.working.as_state
    }

    /// One synchronous decision cycle.
    pub fn cycle(&mut self, now: u64, io: &mut dyn Outputs) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();

        // Bounded critical section: one clone of the live snapshot, plus
        // consumption of the edge-triggered go signal.
        {
            let mut live = lock_live(&self.live);
            self.working = live.clone();
            live.res_go = false;
        }

        let effects = fsm::advance(&mut self.working, &mut self.checkup, now);

        // Physical side effects requested by the checkup sequencer.
        let actions = effects.checkup;
        if let Some(toggling) = actions.watchdog_toggling {
            self.wd_toggling = toggling;
        }
        if actions.close_sdc {
            io.set_sdc_relay(true);
        }
        if let Some(enabled) = actions.ebs1_enable {
            io.set_ebs1(enabled);
        }
        if let Some(enabled) = actions.ebs2_enable {
            io.set_ebs2(enabled);
        }
        if actions.clear_emergency_latch {
            self.working.failure.clear_emergency_latch();
        }

        // Emergency releases both actuators and opens the shutdown
        // circuit, idempotently, so the effect holds even when the
        // transition came from the background monitor between cycles.
        if self.working.as_state == AsState::Emergency {
            io.set_ebs1(false);
            io.set_ebs2(false);
            io.set_sdc_relay(false);
        }

        if self.wd_toggling {
            self.wd_level = !self.wd_level;
            io.set_watchdog(self.wd_level);
        }

        outcome.frames = self.output.update(&self.working, now, io);

        if !self.res_activated {
            self.res_activated = true;
            let _ = outcome.frames.push(protocol::encode_res_activation());
        }

        // Write the decision-owned fields back so the receive path's next
        // readers (and the next cycle's clone) observe them.
        {
            let mut live = lock_live(&self.live);
            live.as_state = self.working.as_state;
            live.checkup_step = self.working.checkup_step;
            live.ebs_phase = self.working.ebs_phase;
            live.go = self.working.go.clone();
            live.emergency_alarm = self.working.emergency_alarm;
            if actions.clear_emergency_latch {
                live.failure.clear_emergency_latch();
            }
            if effects.transition.map(|(_, to)| to) == Some(AsState::Off) {
                // Re-entering OFF is the explicit re-arm path.
                live.mission_finished = false;
                live.res_triggered = false;
            }
        }

        if !self.monitor_armed && self.working.as_state == AsState::Off {
            self.monitor_armed = true;
            outcome.arm_monitor = true;
            info!("arming background emergency monitor");
        }

        outcome.transition = effects.transition;
        outcome
    }

    /// Body of the 150 ms background monitor. This is the only path from
    /// READY or DRIVING into EMERGENCY; it is a no-op in every other
    /// state.
    pub fn emergency_tick(&mut self, now: u64) {
        let mut live = lock_live(&self.live);
        let state = live.as_state;
        if state != AsState::Ready && state != AsState::Driving {
            return;
        }
        if fsm::emergency_guard(state, &live, now) {
            fsm::enter_state(&mut live, &mut self.checkup, AsState::Emergency, now);
            self.working.as_state = AsState::Emergency;
            self.working.emergency_alarm = live.emergency_alarm;
        }
    }
}

/// Spawn the fixed-period emergency monitor with its context captured at
/// registration time. Armed once for the lifetime of the process; never
/// re-armed or disarmed.
pub fn spawn_emergency_monitor(
    supervisor: Arc<Mutex<Supervisor>>,
    epoch: Instant,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_millis(MONITOR_PERIOD_MS));
        loop {
            ticker.tick().await;
            let now = epoch.elapsed().as_millis() as u64;
            let mut guard = match supervisor.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.emergency_tick(now);
        }
    })
}
