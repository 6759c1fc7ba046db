use crate::checkup::{CheckupActions, CheckupSequencer};
use crate::protocol::brake_released;
use crate::snapshot::{AsState, Mission, Snapshot};
use tracing::{debug, info, warn};

/// Effects of one decision cycle, applied by the supervisor.
#[derive(Debug, Default)]
pub struct CycleEffects {
    pub checkup: CheckupActions,
    pub transition: Option<(AsState, AsState)>,
}

/// The car stays under (or falls back to) manual control: manual mission
/// selected with the master switch on or pneumatic pressure present.
fn stay_manual(snap: &Snapshot) -> bool {
    snap.mission == Mission::Manual && (snap.asms_on || snap.ebs_pressure_ok)
}

/// Final re-validation before READY, evaluated after the sequencer
/// reports completion.
fn ready_conditions(snap: &Snapshot, now: u64) -> bool {
    snap.mission != Mission::Manual
        && snap.asms_on
        && snap.ebs_pressure_ok
        && snap.brake_pressure_ok()
        && snap.sdc_closed()
        && snap.failure.ts_energized
        && !snap.failure.any_dead(now)
        && !snap.failure.emergency_latch
}

/// Emergency guard, parameterized by the state it protects. Evaluated
/// only from the 150 ms background monitor; a no-op for every state
/// except READY and DRIVING.
pub fn emergency_guard(state: AsState, snap: &Snapshot, now: u64) -> bool {
    match state {
        AsState::Ready => {
            snap.failure.emergency_latch
                || snap.failure.any_dead(now)
                || !snap.asms_on
                || !snap.failure.ts_energized
                || !snap.sdc_closed()
        }
        AsState::Driving => {
            // Pneumatic pressure and the EBS tolerance windows are
            // evaluated and logged here but deliberately do not gate.
            if !snap.ebs_pressure_ok {
                debug!("pneumatic pressure low while driving (not gating)");
            }
            if snap.go.ebs_released_tolerance.expired(now)
                && !brake_released(snap.brake_pressure_front)
            {
                debug!("brake pressure still high past release tolerance (not gating)");
            }
            snap.failure.emergency_latch
                || snap.failure.any_dead(now)
                || !snap.asms_on
                || !snap.failure.ts_energized
                || !snap.sdc_closed()
        }
        _ => false,
    }
}

/// Apply exit and entry actions for a state change, then record it.
pub(crate) fn enter_state(
    snap: &mut Snapshot,
    checkup: &mut CheckupSequencer,
    to: AsState,
    now: u64,
) {
    let from = snap.as_state;
    if from == to {
        return;
    }

    if from == AsState::Ready {
        snap.go.leave_ready(now);
    }

    match to {
        AsState::Off => {
            checkup.reset();
            snap.checkup_step = checkup.step();
            snap.ebs_phase = checkup.phase();
        }
        AsState::Ready => snap.go.enter_ready(now),
        AsState::Emergency => snap.emergency_alarm.arm(now),
        _ => {}
    }

    info!(?from, ?to, "state transition");
    snap.as_state = to;
}

/// One synchronous decision cycle over the working snapshot.
///
/// READY and DRIVING are never moved to EMERGENCY here; that path
/// belongs exclusively to the background monitor.
pub fn advance(snap: &mut Snapshot, checkup: &mut CheckupSequencer, now: u64) -> CycleEffects {
    let from = snap.as_state;
    let mut effects = CycleEffects::default();

    match snap.as_state {
        AsState::Manual => {
            if !stay_manual(snap) {
                enter_state(snap, checkup, AsState::Off, now);
            }
        }
        AsState::Off => {
            // Re-entrant guard, checked before anything else.
            if stay_manual(snap) {
                enter_state(snap, checkup, AsState::Manual, now);
            } else {
                if let Ok(actions) = checkup.advance(snap, now) {
                    effects.checkup = actions;
                }
                snap.checkup_step = checkup.step();
                snap.ebs_phase = checkup.phase();

                if checkup.is_complete() && ready_conditions(snap, now) {
                    enter_state(snap, checkup, AsState::Ready, now);
                }
            }
        }
        AsState::Ready => {
            if snap.res_go {
                snap.go.on_go(now);
            }
            if snap.go.confirmed {
                enter_state(snap, checkup, AsState::Driving, now);
            }
        }
        AsState::Driving => {
            if !snap.ebs_pressure_ok {
                warn!("pneumatic pressure lost while driving");
            }
            if snap.standing_still() && snap.mission_finished {
                enter_state(snap, checkup, AsState::Finished, now);
            }
        }
        AsState::Finished => {
            if snap.res_triggered {
                enter_state(snap, checkup, AsState::Emergency, now);
            } else if !snap.asms_on {
                enter_state(snap, checkup, AsState::Off, now);
            }
        }
        AsState::Emergency => {
            if !snap.asms_on && snap.emergency_alarm.expired(now) {
                enter_state(snap, checkup, AsState::Off, now);
            }
        }
    }

    if snap.as_state != from {
        effects.transition = Some((from, snap.as_state));
    }
    effects
}
