//! # Autonomous System Control Unit
//!
//! Safety supervisor for a driverless race vehicle: decides once per
//! control cycle whether the car may be off, manually driven, ready,
//! driving, finished, or in emergency shutdown, and drives the physical
//! interlocks (shutdown circuit, EBS actuators, indicators, watchdog)
//! that enforce that decision.
//!
//! ## Architecture
//!
//! - [`snapshot`] - vehicle state model (live copy + per-cycle working copy)
//! - [`protocol`] - bus frame decode/encode, diagnostic record packing
//! - [`failure`] - per-source liveness timeouts and voltage hysteresis
//! - [`checkup`] - ordered pre-flight validation FSM + EBS differential test
//! - [`go`] - driver-confirmation timing for the READY -> DRIVING handover
//! - [`fsm`] - top-level state machine and emergency guard
//! - [`output`] - physical indicators + rate-limited telemetry
//! - [`supervisor`] - orchestrator and concurrency boundary
//!
//! Data flows one way in (frames -> live snapshot -> working snapshot ->
//! decision) and one way out (decision -> outputs + telemetry frames).
//! The receive path writes only the live snapshot; the decision loop
//! copies it once per cycle inside a bounded critical section and reasons
//! over the copy alone.

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod checkup;
pub mod failure;
pub mod fsm;
pub mod go;
pub mod io;
pub mod output;
pub mod protocol;
pub mod snapshot;
pub mod supervisor;
pub mod timer;

pub use protocol::Frame;
pub use snapshot::{AsState, CheckupStep, EbsTestPhase, Mission, Snapshot};
pub use supervisor::{HardwareInputs, Supervisor};
