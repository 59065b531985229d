#![no_std]

//! # espresso-core
//!
//! A `no_std` real-time control core for a single-boiler espresso machine:
//! a zero-cross phase-controlled vibratory
//! pump and AC heater, a PID boiler loop guarded by a thermal-runaway
//! watcher, a multi-leg autobrew executor, FRAM-backed persistent settings
//! with a profile store and folder-tree UI, and the top-level orchestrator
//! tying them together on a fixed 5-step tick.
//!
//! Every peripheral (SPI, I2C, GPIO, timers/alarms) is out of scope: each
//! module exposes plain computation -- read a value in, get a value or a
//! plan back out -- and the embedder owns the actual hardware and its
//! interrupt/alarm wiring.
//!
//! ## Example Usage
//!
//! ```no_run
//! use espresso_core::orchestrator::{EspressoMachine, TickInputs};
//! use espresso_core::control::PidGains;
//!
//! // `store` implements `espresso_core::settings::PersistentStore`.
//! // let heater_gains = PidGains { p: 40.0, i: 0.2, d: 10.0, f: 0.0 };
//! // let flow_gains = PidGains { p: 20.0, i: 5.0, d: 0.0, f: 0.0 };
//! // let mut machine = EspressoMachine::new(store, heater_gains, flow_gains)?;
//! // let leds = machine.tick(TickInputs { now_ms, ac_on, pump_switch, mode_dial, boiler_temp_16c, scale_val_mg });
//! ```

pub mod autobrew;
pub mod console;
pub mod control;
pub mod error;
pub mod gpio;
pub mod orchestrator;
pub mod pump;
pub mod settings;
pub mod time;

pub use error::Error;
pub use orchestrator::EspressoMachine;
