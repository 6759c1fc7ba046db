use ascu::failure::Source;
use ascu::protocol::{
    decode_frame, encode_diag, encode_state, encode_wheel_rpm, Frame, ProtocolError,
    DASH_BRAKE_PRESSURE, DI_EMERGENCY, DI_HEARTBEAT, DI_MISSION_FINISHED, DI_MISSION_SELECT,
    ID_ASCU, ID_DASHBOARD, ID_DI, ID_INVERTER_RX, ID_RES, ID_STEERING, INV_REG_DC_VOLTAGE,
    OUT_DIAG_A, OUT_DIAG_B, OUT_STATE,
};
use ascu::snapshot::{AsState, CheckupStep, EbsTestPhase, Mission, Snapshot};

#[test]
fn test_heartbeat_updates_soc_and_liveness() {
    let mut snap = Snapshot::new(0);
    let frame = Frame::new(ID_DI, &[DI_HEARTBEAT, 73, 0xC8]);

    decode_frame(&mut snap, &frame, 2_000).unwrap();

    assert_eq!(snap.soc_percent, 73);
    assert_eq!(snap.failure.link_quality, 0xC8);
    assert!(!snap.failure.is_dead(Source::DriverInterface, 2_400));
}

#[test]
fn test_mission_finished_and_emergency_signals() {
    let mut snap = Snapshot::new(0);

    decode_frame(&mut snap, &Frame::new(ID_DI, &[DI_MISSION_FINISHED, 0]), 100).unwrap();
    assert!(snap.mission_finished);
    assert!(!snap.failure.emergency_latch);

    decode_frame(&mut snap, &Frame::new(ID_DI, &[DI_EMERGENCY, 0]), 200).unwrap();
    assert!(snap.failure.emergency_latch);
}

#[test]
fn test_mission_select() {
    let mut snap = Snapshot::new(0);
    decode_frame(&mut snap, &Frame::new(ID_DI, &[DI_MISSION_SELECT, 2]), 100).unwrap();
    assert_eq!(snap.mission, Mission::Skidpad);

    // Out-of-range mission codes leave the selector untouched.
    decode_frame(&mut snap, &Frame::new(ID_DI, &[DI_MISSION_SELECT, 42]), 200).unwrap();
    assert_eq!(snap.mission, Mission::Skidpad);
}

#[test]
fn test_res_stop_latches() {
    let mut snap = Snapshot::new(0);
    decode_frame(&mut snap, &Frame::new(ID_RES, &[0x01, 0x00, 0x00]), 100).unwrap();
    assert!(snap.res_triggered);
    assert!(snap.failure.emergency_latch);
    assert!(!snap.res_go);
}

#[test]
fn test_res_go_is_an_edge_signal() {
    let mut snap = Snapshot::new(0);
    decode_frame(&mut snap, &Frame::new(ID_RES, &[0x00, 0x00, 0x02]), 100).unwrap();
    assert!(snap.res_go);
    assert!(!snap.res_triggered);
    assert!(!snap.failure.emergency_latch);
}

#[test]
fn test_inverter_voltage_feeds_hysteresis() {
    let mut snap = Snapshot::new(0);
    let raw: u16 = 0x0FFF;
    let bytes = raw.to_le_bytes();
    let frame = Frame::new(ID_INVERTER_RX, &[INV_REG_DC_VOLTAGE, bytes[0], bytes[1]]);

    decode_frame(&mut snap, &frame, 100).unwrap();
    assert_eq!(snap.failure.dc_voltage_raw, raw);
    assert!(!snap.failure.is_dead(Source::Inverter, 500));
}

#[test]
fn test_steering_ping_only_touches_its_own_liveness() {
    let mut snap = Snapshot::new(0);
    snap.brake_pressure_front = 111;
    snap.brake_pressure_rear = 222;

    // A steering ping must not bleed into the dashboard handler.
    decode_frame(&mut snap, &Frame::new(ID_STEERING, &[0xAA, 0xBB]), 1_000).unwrap();

    assert_eq!(snap.brake_pressure_front, 111);
    assert_eq!(snap.brake_pressure_rear, 222);
    assert!(!snap.failure.is_dead(Source::SteeringActuator, 1_400));
    assert!(snap.failure.is_dead(Source::DriverInterface, 1_400));
}

#[test]
fn test_dashboard_pressures() {
    let mut snap = Snapshot::new(0);
    let frame = Frame::new(ID_DASHBOARD, &[DASH_BRAKE_PRESSURE, 0x34, 0x12, 0x78, 0x56]);
    decode_frame(&mut snap, &frame, 100).unwrap();
    assert_eq!(snap.brake_pressure_front, 0x1234);
    assert_eq!(snap.brake_pressure_rear, 0x5678);
}

#[test]
fn test_unknown_frames_drop_without_state_change() {
    let mut snap = Snapshot::new(0);
    let before = serde_json::to_string(&snap).unwrap();

    let unknown_id = Frame::new(0x7FF, &[0x01, 0x02]);
    assert_eq!(
        decode_frame(&mut snap, &unknown_id, 100),
        Err(ProtocolError::UnknownId(0x7FF))
    );

    let after = serde_json::to_string(&snap).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_unknown_type_byte_drops_payload_fields() {
    let mut snap = Snapshot::new(0);
    let bad_type = Frame::new(ID_DI, &[0x7E, 55]);
    let result = decode_frame(&mut snap, &bad_type, 100);
    assert_eq!(
        result,
        Err(ProtocolError::UnknownType {
            id: ID_DI,
            type_byte: 0x7E
        })
    );
    assert_eq!(snap.soc_percent, 0);
}

#[test]
fn test_short_payload_rejected() {
    let mut snap = Snapshot::new(0);
    let short = Frame::new(ID_DI, &[DI_HEARTBEAT]);
    assert!(matches!(
        decode_frame(&mut snap, &short, 100),
        Err(ProtocolError::PayloadTooShort { .. })
    ));
}

#[test]
fn test_state_frame() {
    let mut snap = Snapshot::new(0);
    snap.as_state = AsState::Driving;
    let frame = encode_state(&snap);
    assert_eq!(frame.id, ID_ASCU);
    assert_eq!(frame.payload(), &[OUT_STATE, 3]);
}

#[test]
fn test_wheel_rpm_fixed_point() {
    let mut snap = Snapshot::new(0);
    snap.wheel_speed_fl = 123.45;
    snap.wheel_speed_fr = 0.0;
    let [fl, fr] = encode_wheel_rpm(&snap);

    let raw = u32::from_le_bytes([fl.data[1], fl.data[2], fl.data[3], fl.data[4]]);
    assert_eq!(raw, 12_345);
    let raw = u32::from_le_bytes([fr.data[1], fr.data[2], fr.data[3], fr.data[4]]);
    assert_eq!(raw, 0);
}

#[test]
fn test_diag_record_golden_bytes() {
    let mut snap = Snapshot::new(0);
    snap.failure.latch_emergency();
    snap.ebs_pressure_ok = true;
    snap.as_state = AsState::Ready; // code 2
    snap.checkup_step = CheckupStep::CheckTimestamps; // code 5
    snap.mission = Mission::Skidpad; // code 2
    snap.ebs_phase = EbsTestPhase::CheckPressureActuator1; // code 1
    snap.brake_pressure_front = 0x0190;
    snap.brake_pressure_rear = 0x00C8;
    snap.soc_percent = 77;
    snap.failure.link_quality = 0xEE;

    let [a, b] = encode_diag(&snap, 0);

    assert_eq!(a.dlc, 8);
    assert_eq!(a.data[0], OUT_DIAG_A);
    assert_eq!(&a.data[1..3], &0x0190u16.to_le_bytes());
    assert_eq!(a.data[3], 77);
    // Emergency latch (bit 7) + pneumatic pressure OK (bit 6).
    assert_eq!(a.data[4], 0xC0);
    // Sequencer step in the high nibble, state in the low nibble.
    assert_eq!(a.data[7], 0x52);

    assert_eq!(b.dlc, 8);
    assert_eq!(b.data[0], OUT_DIAG_B);
    assert_eq!(&b.data[3..5], &0x00C8u16.to_le_bytes());
    assert_eq!(b.data[5], 0xEE);
    // EBS phase high nibble, mission low nibble.
    assert_eq!(b.data[6], 0x12);
}

#[test]
fn test_diag_dead_source_bits() {
    let mut snap = Snapshot::new(0);
    snap.asms_on = true;
    snap.sdc_closed_1 = true;
    snap.sdc_closed_2 = true;
    // All four sources lapse.
    let now = 100_000;
    let [a, _] = encode_diag(&snap, now);
    assert_eq!(a.data[5], 0b1100_1111);

    // Revive the steering actuator only.
    snap.failure.note_alive(Source::SteeringActuator, now);
    let [a, _] = encode_diag(&snap, now);
    assert_eq!(a.data[5], 0b1100_1101);
}
