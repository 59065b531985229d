//! Control-theory building blocks: phase control, slow PWM, PID, and the
//! thermal-runaway watcher (§4.3-§4.8).
//!
//! Every type here is deliberately infallible -- they compute plan values or
//! classifications from plain arguments, mirroring the original firmware's
//! function-pointer-based math which never produced an error value. Only the
//! persistent store and machine setup (§4.11, §4.13) cross an I/O boundary
//! and return [`crate::Error`].

pub mod derivative;
pub mod integral;
pub mod phase;
pub mod pid;
pub mod slow_pwm;
pub mod thermal_runaway;

pub use derivative::DiscreteDerivative;
pub use integral::DiscreteIntegral;
pub use phase::{AlarmPlan, PhaseControlChannel, ZeroCrossEdge, DUTY_TIMEOUTS_US, MAX_DUTY};
pub use pid::{FeedForwardSensor, FeedbackSensor, NoActuator, NoFeedForward, PidController, PidGains, PlantActuator};
pub use slow_pwm::{PeriodPlan, SlowPwm, DEFAULT_NUM_INCREMENTS, DEFAULT_PERIOD_MS};
pub use thermal_runaway::{ThermalRunawayState, ThermalRunawayWatcher};
