use ascu::protocol::{
    Frame, DASH_BRAKE_PRESSURE, DI_EMERGENCY, DI_HEARTBEAT, DI_MISSION_FINISHED, DI_MISSION_SELECT,
    ID_ASCU, ID_DASHBOARD, ID_DI, ID_INVERTER_RX, ID_RES, ID_STEERING, INV_REG_ACTUATOR_READY,
    INV_REG_DC_VOLTAGE, INV_REG_DRIVE_ENABLED, OUT_DIAG_A, OUT_DIAG_B, OUT_MISSION, OUT_STATE,
};
use clap::{App, Arg};
use colored::Colorize;

/// Offline decoder for logged bus frames, `ID#HEXBYTES` per argument,
/// e.g. `500#0150FF` or `510#08c8005040c00052`.
fn main() {
    let matches = App::new("ascu-dump")
        .version("0.1.0")
        .about("Decode and pretty-print logged ASCU bus frames")
        .arg(
            Arg::with_name("frames")
                .value_name("FRAME")
                .help("Frames as ID#HEXBYTES, identifier in hex")
                .multiple(true)
                .required(true),
        )
        .get_matches();

    for raw in matches.values_of("frames").unwrap_or_default() {
        match parse_frame(raw) {
            Ok(frame) => describe(&frame),
            Err(err) => eprintln!("{} {raw}: {err}", "skipping".yellow()),
        }
    }
}

fn parse_frame(raw: &str) -> Result<Frame, String> {
    let (id_part, data_part) = raw
        .split_once('#')
        .ok_or_else(|| "expected ID#HEXBYTES".to_string())?;
    let id = u16::from_str_radix(id_part, 16).map_err(|e| e.to_string())?;
    let hex: String = data_part.chars().filter(|c| !c.is_whitespace()).collect();
    if hex.len() % 2 != 0 || hex.len() > 16 {
        return Err("payload must be 1..=8 hex bytes".to_string());
    }
    let mut payload = Vec::new();
    for chunk in hex.as_bytes().chunks(2) {
        let byte = u8::from_str_radix(std::str::from_utf8(chunk).map_err(|e| e.to_string())?, 16)
            .map_err(|e| e.to_string())?;
        payload.push(byte);
    }
    Ok(Frame::new(id, &payload))
}

fn describe(frame: &Frame) {
    let data = frame.payload();
    let sender = match frame.id {
        ID_DI => "driver-interface",
        ID_RES => "remote-stop",
        ID_INVERTER_RX => "inverter",
        ID_STEERING => "steering",
        ID_DASHBOARD => "dashboard",
        ID_ASCU => "ascu",
        _ => "unknown",
    };
    print!(
        "{:#05x} {:<16} [{}] ",
        frame.id,
        sender.cyan(),
        data.iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    );

    if data.len() < 2 {
        println!("{}", "payload too short".red());
        return;
    }

    let detail = match (frame.id, data[0]) {
        (ID_DI, DI_HEARTBEAT) => format!("heartbeat soc={}%", data[1]),
        (ID_DI, DI_MISSION_FINISHED) => "mission finished".to_string(),
        (ID_DI, DI_EMERGENCY) => "emergency signal".red().bold().to_string(),
        (ID_DI, DI_MISSION_SELECT) => format!("mission select code={}", data[1]),
        (ID_RES, _) => format!(
            "stop={} go={}",
            data[0] & 0x01 != 0,
            data.len() >= 3 && data[2] & 0x02 != 0
        ),
        (ID_INVERTER_RX, INV_REG_DC_VOLTAGE) if data.len() >= 3 => {
            format!("dc bus raw={}", u16::from_le_bytes([data[1], data[2]]))
        }
        (ID_INVERTER_RX, INV_REG_DRIVE_ENABLED) => format!("drive enabled={}", data[1] != 0),
        (ID_INVERTER_RX, INV_REG_ACTUATOR_READY) => format!("actuator ready={}", data[1] != 0),
        (ID_STEERING, _) => "liveness ping".to_string(),
        (ID_DASHBOARD, DASH_BRAKE_PRESSURE) if data.len() >= 5 => format!(
            "brake front={} rear={}",
            u16::from_le_bytes([data[1], data[2]]),
            u16::from_le_bytes([data[3], data[4]])
        ),
        (ID_ASCU, OUT_STATE) => format!("state code={}", data[1]),
        (ID_ASCU, OUT_MISSION) => format!("mission code={}", data[1]),
        (ID_ASCU, OUT_DIAG_A) if data.len() == 8 => format!(
            "diag A: front={} soc={} emergency={} pneumatic={} step={} state={}",
            u16::from_le_bytes([data[1], data[2]]),
            data[3],
            data[4] & 0x80 != 0,
            data[4] & 0x40 != 0,
            data[7] >> 4,
            data[7] & 0x0F
        ),
        (ID_ASCU, OUT_DIAG_B) if data.len() == 8 => format!(
            "diag B: volts={} rear={} link={} phase={} mission={}",
            u16::from_le_bytes([data[1], data[2]]),
            u16::from_le_bytes([data[3], data[4]]),
            data[5],
            data[6] >> 4,
            data[6] & 0x0F
        ),
        _ => "unrecognized".yellow().to_string(),
    };
    println!("{detail}");
}
