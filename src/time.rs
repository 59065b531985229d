//! Timestamp type aliases.
//!
//! This crate does not own a clock: every tick/ISR entry point takes the
//! current time as a parameter rather than reading a hardware timer itself,
//! since the timer peripheral is out of scope (§1). This also makes the
//! control logic trivially testable without a simulated clock.

/// Microseconds since an arbitrary epoch (matches `absolute_time_t` usage in
/// the original firmware for zero-cross and GPIO edge timestamps).
pub type TimestampUs = u64;

/// A duration in microseconds.
pub type DurationUs = u64;

/// Milliseconds since an arbitrary epoch, used by the slower control loops
/// (PID, thermal-runaway, autobrew, slow-PWM).
pub type TimestampMs = u64;

/// A duration in milliseconds.
pub type DurationMs = u64;
