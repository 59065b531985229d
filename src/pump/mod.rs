//! Vibratory pump driver: power curve, lock/unlock, and flow metering (§4.10).
//!
//! Grounded on `machine_logic/ulka_pump.h`/`.c` and `drivers/flow_meter.h`.
//! The pump itself is phase-controlled (§4.3) so most of the actuation lives
//! in [`crate::control::phase`]; this module adds the percent-power curve,
//! the lock interlock, and a pulse-counting flow meter with a pressure
//! estimate built on it.

mod power_curve;

pub use power_curve::{power_for_percent, PumpPower};

use crate::control::derivative::DiscreteDerivative;
use crate::control::phase::PhaseControlChannel;

/// A vibratory pump, phase-controlled, with a lock interlock (e.g. "no
/// water in tank") that forces it off regardless of the commanded power.
pub struct UlkaPump {
    driver: PhaseControlChannel,
    locked: bool,
}

impl UlkaPump {
    pub fn new(driver: PhaseControlChannel) -> Self {
        Self { driver, locked: false }
    }

    /// Commands a percent power in `[0, 100]`, mapped through the recovered
    /// curve. Has no effect while locked; the underlying channel's duty
    /// stays wherever it last was (the source's `ulka_pump_pwr_percent`
    /// returns an error rather than touching the driver while locked).
    pub fn set_power_percent(&mut self, percent: u8) -> Result<(), PumpLockedError> {
        if self.locked {
            return Err(PumpLockedError);
        }
        self.driver.set_duty(power_for_percent(percent));
        Ok(())
    }

    /// Immediately commands zero power, bypassing the lock (used for
    /// emergency stop).
    pub fn off(&mut self) {
        self.driver.set_duty(0);
    }

    pub fn lock(&mut self) {
        self.locked = true;
        self.driver.set_duty(0);
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The raw phase-control duty index currently in effect.
    pub fn power(&self) -> u8 {
        self.driver.duty()
    }

    pub fn driver_mut(&mut self) -> &mut PhaseControlChannel {
        &mut self.driver
    }
}

/// Returned when a power command is rejected because the pump is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpLockedError;

/// Estimates outlet pressure from commanded power and measured flow rate.
/// The source ships no implementation for this (only the percent-power
/// curve survives in the authoritative tree); the crate supplies a default
/// linear model and lets the embedder substitute their own via the trait.
pub trait PressureModel {
    fn estimate(&self, power: PumpPower, flow_rate_ml_s: f32) -> f32;
}

/// `pressure = power_fraction * max_pressure - flow_rate * flow_resistance`.
pub struct LinearPressureModel {
    pub max_pressure: f32,
    pub flow_resistance: f32,
}

impl PressureModel for LinearPressureModel {
    fn estimate(&self, power: PumpPower, flow_rate_ml_s: f32) -> f32 {
        let power_fraction = power.percent() as f32 / 100.0;
        (power_fraction * self.max_pressure - flow_rate_ml_s * self.flow_resistance).max(0.0)
    }
}

/// A pulse-counting flow meter: accumulates pulses and derives a rate from
/// them via a [`DiscreteDerivative`] over the pulse count (grounded on
/// `flow_meter.h`).
pub struct FlowMeter {
    conversion_factor: f32,
    pulse_count: u32,
    rate: DiscreteDerivative,
}

impl FlowMeter {
    /// `conversion_factor` converts pulse counts to a volume unit (e.g. mL).
    pub fn new(conversion_factor: f32, filter_span_ms: u32) -> Self {
        Self {
            conversion_factor,
            pulse_count: 0,
            rate: DiscreteDerivative::new(filter_span_ms, 0),
        }
    }

    /// Call from the pulse-count ISR/dispatch on each tick of the meter.
    pub fn on_pulse(&mut self, now_ms: u64) {
        self.pulse_count += 1;
        self.rate.add(now_ms as i64, self.pulse_count as f32);
    }

    /// Volume accumulated since the last [`FlowMeter::zero`].
    pub fn volume(&self) -> f32 {
        self.pulse_count as f32 * self.conversion_factor
    }

    /// Flow rate in volume/second.
    pub fn rate(&self) -> f32 {
        self.rate.read() * self.conversion_factor
    }

    /// Resets the accumulated volume and rate to 0.
    pub fn zero(&mut self) {
        self.pulse_count = 0;
        self.rate.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::phase::ZeroCrossEdge;

    #[test]
    fn locked_pump_rejects_power_commands() {
        let mut pump = UlkaPump::new(PhaseControlChannel::new(ZeroCrossEdge::Rising, 0));
        pump.lock();
        assert_eq!(pump.set_power_percent(50), Err(PumpLockedError));
        assert_eq!(pump.power(), 0);
    }

    #[test]
    fn unlocked_pump_accepts_power_commands() {
        let mut pump = UlkaPump::new(PhaseControlChannel::new(ZeroCrossEdge::Rising, 0));
        pump.set_power_percent(50).unwrap();
        assert_eq!(pump.power(), power_for_percent(50));
    }

    #[test]
    fn off_bypasses_the_lock() {
        let mut pump = UlkaPump::new(PhaseControlChannel::new(ZeroCrossEdge::Rising, 0));
        pump.set_power_percent(50).unwrap();
        pump.lock();
        pump.off();
        assert_eq!(pump.power(), 0);
    }

    #[test]
    fn flow_meter_accumulates_volume_and_resets() {
        let mut fm = FlowMeter::new(0.5, 10_000);
        for t in 0..10 {
            fm.on_pulse(t * 100);
        }
        assert_eq!(fm.volume(), 5.0);
        fm.zero();
        assert_eq!(fm.volume(), 0.0);
    }

    #[test]
    fn linear_pressure_model_increases_with_power_and_decreases_with_flow() {
        let model = LinearPressureModel { max_pressure: 9.0, flow_resistance: 0.1 };
        let low = model.estimate(PumpPower::from_raw_duty(power_for_percent(20)), 0.0);
        let high = model.estimate(PumpPower::from_raw_duty(power_for_percent(80)), 0.0);
        assert!(high > low);
        let with_flow = model.estimate(PumpPower::from_raw_duty(power_for_percent(80)), 50.0);
        assert!(with_flow < high);
    }
}
