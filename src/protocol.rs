use crate::failure::Source;
use crate::snapshot::{Snapshot, BRAKE_PRESSURE_OK_RAW};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;
use tracing::debug;

/// Fixed 11-bit identifiers partitioning bus traffic by sender.
pub const ID_DI: u16 = 0x500;
pub const ID_RES: u16 = 0x191;
pub const ID_RES_ACTIVATE: u16 = 0x000;
pub const ID_INVERTER_RX: u16 = 0x181;
pub const ID_INVERTER_TX: u16 = 0x201;
pub const ID_STEERING: u16 = 0x502;
pub const ID_DASHBOARD: u16 = 0x503;
/// This unit's own outbound channel.
pub const ID_ASCU: u16 = 0x510;

// Driver-interface message types.
pub const DI_HEARTBEAT: u8 = 0x01;
pub const DI_MISSION_FINISHED: u8 = 0x02;
pub const DI_EMERGENCY: u8 = 0x03;
pub const DI_MISSION_SELECT: u8 = 0x04;

// Inverter response registers.
pub const INV_REG_ACTUATOR_READY: u8 = 0x51;
pub const INV_REG_DRIVE_ENABLED: u8 = 0xE8;
pub const INV_REG_DC_VOLTAGE: u8 = 0xEB;

// Dashboard message types.
pub const DASH_BRAKE_PRESSURE: u8 = 0x01;

// Outbound message types on `ID_ASCU`.
pub const OUT_STATE: u8 = 0x01;
pub const OUT_MISSION: u8 = 0x02;
pub const OUT_SOC: u8 = 0x03;
pub const OUT_ASMS: u8 = 0x04;
pub const OUT_RPM_FL: u8 = 0x05;
pub const OUT_RPM_FR: u8 = 0x06;
pub const OUT_EBS_STATUS: u8 = 0x07;
pub const OUT_DIAG_A: u8 = 0x08;
pub const OUT_DIAG_B: u8 = 0x09;

pub const FRAME_DATA_LEN: usize = 8;
const_assert!(FRAME_DATA_LEN == 8);

/// Fixed-point scale for wheel RPM on the wire.
pub const RPM_SCALE: f32 = 100.0;

/// One bus frame: 11-bit identifier plus a 2..=8 byte payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub id: u16,
    pub dlc: u8,
    pub data: [u8; FRAME_DATA_LEN],
}

impl Frame {
    pub fn new(id: u16, payload: &[u8]) -> Self {
        let mut data = [0u8; FRAME_DATA_LEN];
        let len = payload.len().min(FRAME_DATA_LEN);
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id,
            dlc: len as u8,
            data,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown identifier {0:#05x}")]
    UnknownId(u16),
    #[error("unknown type byte {type_byte:#04x} on {id:#05x}")]
    UnknownType { id: u16, type_byte: u8 },
    #[error("payload too short for {id:#05x}: {len} bytes")]
    PayloadTooShort { id: u16, len: usize },
}

fn u16_le(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

/// Decode one inbound frame into the live snapshot.
///
/// Every successfully decoded frame re-arms the liveness timer of its
/// sender. Undecodable frames are reported as errors; the caller drops
/// them without touching state.
pub fn decode_frame(snap: &mut Snapshot, frame: &Frame, now: u64) -> Result<(), ProtocolError> {
    let data = frame.payload();
    if data.len() < 2 {
        return Err(ProtocolError::PayloadTooShort {
            id: frame.id,
            len: data.len(),
        });
    }

    match frame.id {
        ID_DI => {
            snap.failure.note_alive(Source::DriverInterface, now);
            match data[0] {
                DI_HEARTBEAT => {
                    snap.soc_percent = data[1];
                    if data.len() >= 3 {
                        snap.failure.link_quality = data[2];
                    }
                }
                DI_MISSION_FINISHED => {
                    snap.mission_finished = true;
                }
                DI_EMERGENCY => {
                    snap.failure.latch_emergency();
                }
                DI_MISSION_SELECT => {
                    if let Some(mission) = crate::snapshot::Mission::from_code(data[1]) {
                        snap.mission = mission;
                    }
                }
                other => {
                    return Err(ProtocolError::UnknownType {
                        id: frame.id,
                        type_byte: other,
                    });
                }
            }
        }
        ID_RES => {
            snap.failure.note_alive(Source::Res, now);
            // Stop is asserted while bit 0 of the status byte is set.
            if data[0] & 0x01 != 0 {
                snap.res_triggered = true;
                snap.failure.latch_emergency();
            }
            if data.len() >= 3 && data[2] & 0x02 != 0 {
                snap.res_go = true;
            }
        }
        ID_INVERTER_RX => {
            snap.failure.note_alive(Source::Inverter, now);
            match data[0] {
                INV_REG_DC_VOLTAGE => {
                    if data.len() < 3 {
                        return Err(ProtocolError::PayloadTooShort {
                            id: frame.id,
                            len: data.len(),
                        });
                    }
                    snap.failure.update_dc_voltage(u16_le(data, 1), now);
                }
                INV_REG_DRIVE_ENABLED => {
                    snap.drive_enabled = data[1] != 0;
                }
                INV_REG_ACTUATOR_READY => {
                    snap.inverter_ready = data[1] != 0;
                }
                other => {
                    return Err(ProtocolError::UnknownType {
                        id: frame.id,
                        type_byte: other,
                    });
                }
            }
        }
        ID_STEERING => {
            // Pure liveness ping; payload content is not interpreted.
            snap.failure.note_alive(Source::SteeringActuator, now);
        }
        ID_DASHBOARD => match data[0] {
            DASH_BRAKE_PRESSURE => {
                if data.len() < 5 {
                    return Err(ProtocolError::PayloadTooShort {
                        id: frame.id,
                        len: data.len(),
                    });
                }
                snap.brake_pressure_front = u16_le(data, 1);
                snap.brake_pressure_rear = u16_le(data, 3);
            }
            other => {
                return Err(ProtocolError::UnknownType {
                    id: frame.id,
                    type_byte: other,
                });
            }
        },
        other => {
            debug!(id = other, "dropping frame with unknown identifier");
            return Err(ProtocolError::UnknownId(other));
        }
    }

    Ok(())
}

pub fn encode_state(snap: &Snapshot) -> Frame {
    Frame::new(ID_ASCU, &[OUT_STATE, snap.as_state.code()])
}

pub fn encode_mission(snap: &Snapshot) -> Frame {
    Frame::new(ID_ASCU, &[OUT_MISSION, snap.mission.code()])
}

pub fn encode_soc(snap: &Snapshot) -> Frame {
    Frame::new(ID_ASCU, &[OUT_SOC, snap.soc_percent])
}

pub fn encode_asms(snap: &Snapshot) -> Frame {
    Frame::new(ID_ASCU, &[OUT_ASMS, u8::from(snap.asms_on)])
}

pub fn encode_wheel_rpm(snap: &Snapshot) -> [Frame; 2] {
    let fl = (snap.wheel_speed_fl * RPM_SCALE) as u32;
    let fr = (snap.wheel_speed_fr * RPM_SCALE) as u32;
    let fl_bytes = fl.to_le_bytes();
    let fr_bytes = fr.to_le_bytes();
    [
        Frame::new(
            ID_ASCU,
            &[OUT_RPM_FL, fl_bytes[0], fl_bytes[1], fl_bytes[2], fl_bytes[3]],
        ),
        Frame::new(
            ID_ASCU,
            &[OUT_RPM_FR, fr_bytes[0], fr_bytes[1], fr_bytes[2], fr_bytes[3]],
        ),
    ]
}

pub fn encode_ebs_status(snap: &Snapshot) -> Frame {
    let mut flags = 0u8;
    if snap.ebs_pressure_1 {
        flags |= 0x01;
    }
    if snap.ebs_pressure_2 {
        flags |= 0x02;
    }
    if snap.ebs_pressure_ok {
        flags |= 0x04;
    }
    Frame::new(ID_ASCU, &[OUT_EBS_STATUS, flags])
}

/// Two-frame packed diagnostic record. The bit layout is consumed by
/// existing loggers and must stay stable.
///
/// Frame A: type, brake pressure front (LE), state of charge, flag byte
/// (bit 7 emergency latch, bit 6 pneumatic pressure OK, bit 5 EBS armed
/// tolerance expired, bit 4 EBS released tolerance expired), dead-source
/// byte (bits 0..3 DI/steering/inverter/RES, bit 6 SDC closed, bit 7
/// ASMS), reserved, nibble-packed step/state (high/low).
///
/// Frame B: type, DC bus voltage (LE), brake pressure rear (LE), link
/// quality, nibble-packed EBS phase/mission (high/low), reserved.
pub fn encode_diag(snap: &Snapshot, now: u64) -> [Frame; 2] {
    let front = snap.brake_pressure_front.to_le_bytes();
    let rear = snap.brake_pressure_rear.to_le_bytes();
    let volts = snap.failure.dc_voltage_raw.to_le_bytes();

    let mut flags = 0u8;
    if snap.failure.emergency_latch {
        flags |= 0x80;
    }
    if snap.ebs_pressure_ok {
        flags |= 0x40;
    }
    if snap.go.ebs_armed_tolerance.expired(now) {
        flags |= 0x20;
    }
    if snap.go.ebs_released_tolerance.expired(now) {
        flags |= 0x10;
    }

    let dead = snap.failure.dead_sources(now);
    let mut sources = 0u8;
    for (bit, is_dead) in dead.iter().enumerate() {
        if *is_dead {
            sources |= 1 << bit;
        }
    }
    if snap.sdc_closed() {
        sources |= 0x40;
    }
    if snap.asms_on {
        sources |= 0x80;
    }

    let step_state = (snap.checkup_step.code() << 4) | (snap.as_state.code() & 0x0F);
    let phase_mission = (snap.ebs_phase.code() << 4) | (snap.mission.code() & 0x0F);

    [
        Frame::new(
            ID_ASCU,
            &[
                OUT_DIAG_A,
                front[0],
                front[1],
                snap.soc_percent,
                flags,
                sources,
                0,
                step_state,
            ],
        ),
        Frame::new(
            ID_ASCU,
            &[
                OUT_DIAG_B,
                volts[0],
                volts[1],
                rear[0],
                rear[1],
                snap.failure.link_quality,
                phase_mission,
                0,
            ],
        ),
    ]
}

/// One-shot activation request for the remote-stop receiver.
pub fn encode_res_activation() -> Frame {
    Frame::new(ID_RES_ACTIVATE, &[0x01, 0x00])
}

/// Hydraulic pressure counts as released below the OK threshold.
pub fn brake_released(pressure: u16) -> bool {
    pressure < BRAKE_PRESSURE_OK_RAW
}
