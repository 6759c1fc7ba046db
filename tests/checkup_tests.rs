use ascu::checkup::{CheckupError, CheckupSequencer, WATCHDOG_HOLD_MS};
use ascu::failure::Source;
use ascu::snapshot::{CheckupStep, EbsTestPhase, Mission, Snapshot};

/// Snapshot satisfying every checkup guard at `now`.
fn satisfied_snapshot(now: u64) -> Snapshot {
    let mut snap = Snapshot::new(now);
    snap.asms_on = true;
    snap.asats_pressed = true;
    snap.ebs_pressure_1 = true;
    snap.ebs_pressure_2 = true;
    snap.ebs_pressure_ok = true;
    snap.brake_pressure_front = 200;
    snap.brake_pressure_rear = 200;
    snap.watchdog_ok = false;
    snap.mission = Mission::Trackdrive;
    snap.failure.ts_energized = true;
    for source in Source::ALL {
        snap.failure.note_alive(source, now);
    }
    snap
}

/// Run the sequencer to completion with all guards satisfied, returning
/// the times it was called.
fn run_to_done(seq: &mut CheckupSequencer, snap: &mut Snapshot) -> u64 {
    let mut now = 0;
    for _ in 0..100 {
        for source in Source::ALL {
            snap.failure.note_alive(source, now);
        }
        let _ = seq.advance(snap, now);
        if seq.is_complete() {
            return now;
        }
        now += 100;
    }
    panic!("sequencer never completed, stuck at {:?}", seq.step());
}

#[test]
fn test_failing_guard_is_idempotent() {
    let mut seq = CheckupSequencer::new();
    let snap = Snapshot::new(0);

    for call in 0..10 {
        let result = seq.advance(&snap, call * 10);
        assert_eq!(result.unwrap_err(), CheckupError::AsmsOff);
        assert_eq!(seq.step(), CheckupStep::WaitForAsms);
        assert_eq!(seq.phase(), EbsTestPhase::DisableActuator2);
    }
}

#[test]
fn test_one_step_per_call() {
    let mut seq = CheckupSequencer::new();
    let mut snap = satisfied_snapshot(0);

    let _ = seq.advance(&snap, 0);
    assert_eq!(seq.step(), CheckupStep::WatchdogCheck);

    // The watchdog test needs its hold window; nothing else advances
    // meanwhile even though all later guards are satisfied.
    let _ = seq.advance(&snap, 10);
    assert_eq!(seq.step(), CheckupStep::WatchdogCheck);

    snap.watchdog_ok = false;
    let _ = seq.advance(&snap, 10 + WATCHDOG_HOLD_MS);
    assert_eq!(seq.step(), CheckupStep::CheckEbsStorage);
}

#[test]
fn test_watchdog_that_never_trips_reports_distinct_error() {
    let mut seq = CheckupSequencer::new();
    let mut snap = satisfied_snapshot(0);
    snap.watchdog_ok = true;

    let _ = seq.advance(&snap, 0); // ASMS gate
    let _ = seq.advance(&snap, 0); // stops the toggle, starts observing
    for call in 1..10 {
        let result = seq.advance(&snap, call * 1000);
        assert_eq!(result.unwrap_err(), CheckupError::WatchdogStillHigh);
        assert_eq!(seq.step(), CheckupStep::WatchdogCheck);
    }
}

#[test]
fn test_ordered_walk_to_completion() {
    let mut seq = CheckupSequencer::new();
    let mut snap = satisfied_snapshot(0);

    let expected = [
        CheckupStep::WaitForAsms,
        CheckupStep::WatchdogCheck,
        CheckupStep::CheckEbsStorage,
        CheckupStep::CheckBrakePressure,
        CheckupStep::WaitForAsats,
        CheckupStep::CheckTimestamps,
        CheckupStep::CloseSdc,
        CheckupStep::WaitForTs,
        CheckupStep::EbsCheck,
        CheckupStep::Done,
    ];

    let mut seen = vec![seq.step()];
    let mut now = 0;
    while !seq.is_complete() {
        for source in Source::ALL {
            snap.failure.note_alive(source, now);
        }
        let _ = seq.advance(&snap, now);
        if *seen.last().unwrap() != seq.step() {
            seen.push(seq.step());
        }
        now += 100;
        assert!(now < 10_000, "stuck at {:?}", seq.step());
    }

    assert_eq!(seen, expected);
}

#[test]
fn test_timestamps_step_blocks_on_dead_source() {
    let mut seq = CheckupSequencer::new();
    let mut snap = satisfied_snapshot(0);

    // Walk up to the timestamp check.
    let mut now = 0;
    while seq.step() != CheckupStep::CheckTimestamps {
        for source in Source::ALL {
            snap.failure.note_alive(source, now);
        }
        let _ = seq.advance(&snap, now);
        now += 100;
    }

    // All liveness windows lapse.
    now += 5_000;
    let result = seq.advance(&snap, now);
    assert_eq!(result.unwrap_err(), CheckupError::SourceDead);
    assert_eq!(seq.step(), CheckupStep::CheckTimestamps);

    // Resolving the liveness unblocks the step.
    for source in Source::ALL {
        snap.failure.note_alive(source, now);
    }
    assert!(seq.advance(&snap, now).is_ok());
    assert_eq!(seq.step(), CheckupStep::CloseSdc);
}

#[test]
fn test_timestamps_step_blocks_on_latch() {
    let mut seq = CheckupSequencer::new();
    let mut snap = satisfied_snapshot(0);

    let mut now = 0;
    while seq.step() != CheckupStep::CheckTimestamps {
        for source in Source::ALL {
            snap.failure.note_alive(source, now);
        }
        let _ = seq.advance(&snap, now);
        now += 100;
    }

    snap.failure.latch_emergency();
    for source in Source::ALL {
        snap.failure.note_alive(source, now);
    }
    let result = seq.advance(&snap, now);
    assert_eq!(result.unwrap_err(), CheckupError::EmergencyLatched);
    assert_eq!(seq.step(), CheckupStep::CheckTimestamps);
}

#[test]
fn test_asats_step_requests_latch_clear() {
    let mut seq = CheckupSequencer::new();
    let mut snap = satisfied_snapshot(0);
    snap.failure.latch_emergency();

    let mut now = 0;
    while seq.step() != CheckupStep::WaitForAsats {
        let _ = seq.advance(&snap, now);
        now += 100;
    }

    let actions = seq.advance(&snap, now).unwrap();
    assert!(actions.clear_emergency_latch);
    assert_eq!(seq.step(), CheckupStep::CheckTimestamps);
}

#[test]
fn test_sdc_close_refused_in_manual_mission() {
    let mut seq = CheckupSequencer::new();
    let mut snap = satisfied_snapshot(0);

    let mut now = 0;
    while seq.step() != CheckupStep::CloseSdc {
        for source in Source::ALL {
            snap.failure.note_alive(source, now);
        }
        let _ = seq.advance(&snap, now);
        now += 100;
    }

    snap.mission = Mission::Manual;
    for source in Source::ALL {
        snap.failure.note_alive(source, now);
    }
    let result = seq.advance(&snap, now);
    assert_eq!(result.unwrap_err(), CheckupError::ManualMission);
    assert_eq!(seq.step(), CheckupStep::CloseSdc);
}

#[test]
fn test_ebs_differential_test_sequencing() {
    let mut seq = CheckupSequencer::new();
    let mut snap = satisfied_snapshot(0);

    let mut now = 0;
    while seq.step() != CheckupStep::EbsCheck {
        for source in Source::ALL {
            snap.failure.note_alive(source, now);
        }
        let _ = seq.advance(&snap, now);
        now += 100;
    }

    // Phase 1: rear actuator disabled, front must hold pressure alone.
    let actions = seq.advance(&snap, now).unwrap();
    assert_eq!(actions.ebs2_enable, Some(false));
    assert_eq!(seq.phase(), EbsTestPhase::CheckPressureActuator1);

    now += 100;
    let _ = seq.advance(&snap, now).unwrap();
    assert_eq!(seq.phase(), EbsTestPhase::EnableActuator2DisableActuator1);

    // Phase 2: swap actuators.
    now += 100;
    let actions = seq.advance(&snap, now).unwrap();
    assert_eq!(actions.ebs2_enable, Some(true));
    assert_eq!(actions.ebs1_enable, Some(false));
    assert_eq!(seq.phase(), EbsTestPhase::CheckPressureActuator2);

    now += 100;
    let _ = seq.advance(&snap, now).unwrap();
    assert_eq!(seq.phase(), EbsTestPhase::EnableActuator1);

    // Finish: front re-enabled, outer step done, phase reset.
    now += 100;
    let actions = seq.advance(&snap, now).unwrap();
    assert_eq!(actions.ebs1_enable, Some(true));
    assert_eq!(seq.step(), CheckupStep::Done);
    assert_eq!(seq.phase(), EbsTestPhase::DisableActuator2);
}

#[test]
fn test_ebs_pressure_timeout_reports_error_and_holds_phase() {
    let mut seq = CheckupSequencer::new();
    let mut snap = satisfied_snapshot(0);

    let mut now = 0;
    while seq.step() != CheckupStep::EbsCheck {
        for source in Source::ALL {
            snap.failure.note_alive(source, now);
        }
        let _ = seq.advance(&snap, now);
        now += 100;
    }

    let _ = seq.advance(&snap, now).unwrap();
    assert_eq!(seq.phase(), EbsTestPhase::CheckPressureActuator1);

    // No pressure from the front actuator.
    snap.brake_pressure_front = 0;
    now += 2_000;
    let result = seq.advance(&snap, now);
    assert_eq!(result.unwrap_err(), CheckupError::EbsPressureNotBuilding);
    assert_eq!(seq.phase(), EbsTestPhase::CheckPressureActuator1);
    assert_eq!(seq.step(), CheckupStep::EbsCheck);
}

#[test]
fn test_reset_returns_to_first_step_and_phase() {
    let mut seq = CheckupSequencer::new();
    let mut snap = satisfied_snapshot(0);
    run_to_done(&mut seq, &mut snap);

    seq.reset();
    assert_eq!(seq.step(), CheckupStep::WaitForAsms);
    assert_eq!(seq.phase(), EbsTestPhase::DisableActuator2);
    assert!(seq.error_history().is_empty());
}

#[test]
fn test_error_history_records_distinct_codes() {
    let mut seq = CheckupSequencer::new();
    let snap = Snapshot::new(0);

    let _ = seq.advance(&snap, 0);
    let _ = seq.advance(&snap, 10);
    // Repeats of the same error at the same step are collapsed.
    assert_eq!(seq.error_history().len(), 1);
    assert_eq!(seq.error_history()[0].error, CheckupError::AsmsOff);
    assert_eq!(seq.error_history()[0].error.code(), 0x01);
}
