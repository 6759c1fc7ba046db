use ascu::io::MockOutputs;
use ascu::protocol::{
    Frame, DASH_BRAKE_PRESSURE, DI_HEARTBEAT, DI_MISSION_FINISHED, DI_MISSION_SELECT, ID_DASHBOARD,
    ID_DI, ID_INVERTER_RX, ID_RES, ID_STEERING, INV_REG_DC_VOLTAGE,
};
use ascu::supervisor::{apply_inputs, receive_frame, spawn_emergency_monitor, HardwareInputs};
use ascu::{AsState, Supervisor};
use clap::{App, Arg};
use colored::Colorize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

/// Closed-loop bench simulator: scripts the rest of the car around the
/// supervisor and runs a full mission from power-up to shutdown.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let matches = App::new("ascu-sim")
        .version("0.1.0")
        .about("Autonomous-system supervisor bench simulator")
        .arg(
            Arg::with_name("period")
                .short("p")
                .long("period")
                .value_name("MS")
                .help("Decision cycle period in milliseconds")
                .takes_value(true)
                .default_value("25"),
        )
        .arg(
            Arg::with_name("duration")
                .short("d")
                .long("duration")
                .value_name("SECONDS")
                .help("Simulation duration")
                .takes_value(true)
                .default_value("40"),
        )
        .arg(
            Arg::with_name("json")
                .long("json")
                .help("Emit working-snapshot JSON lines alongside the log"),
        )
        .get_matches();

    let period_ms: u64 = matches
        .value_of("period")
        .and_then(|v| v.parse().ok())
        .unwrap_or(25);
    let duration_s: u64 = matches
        .value_of("duration")
        .and_then(|v| v.parse().ok())
        .unwrap_or(40);
    let emit_json = matches.is_present("json");

    println!("{}", "ASCU bench simulator".bold());

    let epoch = Instant::now();
    let supervisor = Arc::new(Mutex::new(Supervisor::new(0)));
    let live = supervisor
        .lock()
        .expect("supervisor lock")
        .live_handle();

    let mut io = MockOutputs::new();
    let mut script = Script::new();
    let mut monitor = None;
    let mut ticker = tokio::time::interval(Duration::from_millis(period_ms));

    loop {
        ticker.tick().await;
        let now = epoch.elapsed().as_millis() as u64;
        if now > duration_s * 1000 {
            break;
        }

        script.drive(now, &live, &io);

        let outcome = {
            let mut sup = supervisor.lock().expect("supervisor lock");
            sup.cycle(now, &mut io)
        };

        if outcome.arm_monitor {
            monitor = Some(spawn_emergency_monitor(Arc::clone(&supervisor), epoch));
        }

        if let Some((from, to)) = outcome.transition {
            println!(
                "[{:>6} ms] {} {:?} -> {:?}",
                now,
                "TRANSITION".green().bold(),
                from,
                to
            );
        }

        script.observe_state(now, &supervisor);

        if emit_json && now % 1000 < period_ms {
            let sup = supervisor.lock().expect("supervisor lock");
            if let Ok(line) = serde_json::to_string(sup.working()) {
                println!("{line}");
            }
        }

        if script.shutdown_complete {
            break;
        }
    }

    if let Some(handle) = monitor {
        handle.abort();
    }
    let sup = supervisor.lock().expect("supervisor lock");
    println!(
        "{} final state {:?}, checkup step {:?}",
        "DONE".bold(),
        sup.state(),
        sup.checkup().step()
    );
}

/// Scripted behavior of every other ECU on the car.
struct Script {
    ready_since: Option<u64>,
    driving_since: Option<u64>,
    finished_seen: bool,
    shutdown_complete: bool,
    wd_edges_seen: u32,
    wd_stale_cycles: u32,
    state: AsState,
}

impl Script {
    fn new() -> Self {
        Self {
            ready_since: None,
            driving_since: None,
            finished_seen: false,
            shutdown_complete: false,
            wd_edges_seen: 0,
            wd_stale_cycles: 0,
            state: AsState::Off,
        }
    }

    fn drive(&mut self, now: u64, live: &Mutex<ascu::Snapshot>, io: &MockOutputs) {
        // The watchdog ready-signal stays high while the supervisor keeps
        // toggling and falls once the toggle stops.
        if io.watchdog_edges == self.wd_edges_seen {
            self.wd_stale_cycles += 1;
        } else {
            self.wd_stale_cycles = 0;
            self.wd_edges_seen = io.watchdog_edges;
        }
        let watchdog_ok = self.wd_stale_cycles < 2;

        let asms_on = now >= 1_000 && !self.finished_seen;
        let driving = self.state == AsState::Driving;
        apply_inputs(
            live,
            &HardwareInputs {
                ebs_pressure_1: true,
                ebs_pressure_2: true,
                asms_on,
                asats_pressed: now >= 2_000,
                sdc_closed_1: io.sdc_relay_closed,
                sdc_closed_2: io.sdc_relay_closed,
                watchdog_ok,
                wheel_speed_fl: if driving && self.driving_since.map_or(false, |t| now < t + 3_000) {
                    800.0
                } else {
                    0.0
                },
                wheel_speed_fr: if driving && self.driving_since.map_or(false, |t| now < t + 3_000) {
                    800.0
                } else {
                    0.0
                },
            },
        );

        // Heartbeats and sensor traffic every 100 ms.
        if now % 100 < 25 {
            receive_frame(live, &Frame::new(ID_DI, &[DI_HEARTBEAT, 80, 0xFF]), now);
            receive_frame(live, &Frame::new(ID_STEERING, &[0x01, 0x00]), now);
            receive_frame(live, &Frame::new(ID_RES, &[0x00, 0x00, 0x00]), now);

            let raw: u16 = if io.sdc_relay_closed { 0x0FFF } else { 0x0000 };
            let volts = raw.to_le_bytes();
            receive_frame(
                live,
                &Frame::new(ID_INVERTER_RX, &[INV_REG_DC_VOLTAGE, volts[0], volts[1]]),
                now,
            );

            // Hydraulic pressure follows whichever EBS actuators are
            // enabled, which is what the differential test exercises.
            let front: u16 = if io.ebs1_enabled { 200 } else { 0 };
            let rear: u16 = if io.ebs2_enabled { 200 } else { 0 };
            let f = front.to_le_bytes();
            let r = rear.to_le_bytes();
            receive_frame(
                live,
                &Frame::new(ID_DASHBOARD, &[DASH_BRAKE_PRESSURE, f[0], f[1], r[0], r[1]]),
                now,
            );
        }

        if now >= 500 && now < 600 {
            receive_frame(live, &Frame::new(ID_DI, &[DI_MISSION_SELECT, 4]), now);
        }

        // Go confirmation, pressed repeatedly once READY has settled.
        if let Some(since) = self.ready_since {
            if now >= since + 5_500 && now % 500 < 25 {
                receive_frame(live, &Frame::new(ID_RES, &[0x00, 0x00, 0x02]), now);
            }
        }

        // Mission completion after a short drive.
        if let Some(since) = self.driving_since {
            if now >= since + 3_500 && now % 500 < 25 {
                receive_frame(live, &Frame::new(ID_DI, &[DI_MISSION_FINISHED, 0]), now);
            }
        }
    }

    fn observe_state(&mut self, now: u64, supervisor: &Arc<Mutex<Supervisor>>) {
        let state = supervisor.lock().expect("supervisor lock").state();
        if state != self.state {
            info!(?state, "script observed state change");
            self.state = state;
        }
        match state {
            AsState::Ready => {
                self.ready_since.get_or_insert(now);
            }
            AsState::Driving => {
                self.driving_since.get_or_insert(now);
            }
            AsState::Finished => {
                self.finished_seen = true;
            }
            AsState::Off if self.finished_seen => {
                self.shutdown_complete = true;
            }
            _ => {}
        }
    }
}
