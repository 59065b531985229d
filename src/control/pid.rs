//! PID controller with least-squares derivative, anti-windup integral, and
//! feed-forward (§4.4).
//!
//! Grounded on `pid.h`/`pid.c`. The sensor/feed-forward/actuator hooks are
//! modeled as small traits rather than C function pointers, per §9's design
//! note ("a small trait/interface with `read() -> value` and `apply(value)`,
//! ... so composition and mocking for tests are trivial").

use super::derivative::DiscreteDerivative;
use super::integral::DiscreteIntegral;

/// Reads the process variable being controlled (e.g. boiler temperature,
/// pump flow rate).
pub trait FeedbackSensor {
    fn read(&mut self) -> f32;
}

/// Reads an auxiliary signal for the feed-forward term. `NoFeedForward`
/// implements this as a constant 0 for controllers without one configured.
pub trait FeedForwardSensor {
    fn read(&mut self) -> f32;
}

/// A feed-forward sensor that is always absent.
pub struct NoFeedForward;
impl FeedForwardSensor for NoFeedForward {
    fn read(&mut self) -> f32 {
        0.0
    }
}

/// Applies the controller's output to the plant (e.g. the boiler's slow-PWM
/// duty, or the pump's power). `NoActuator` is used when the controller only
/// needs to be read (e.g. the flow-control inner loop inside autobrew).
pub trait PlantActuator {
    fn apply(&mut self, u: f32);
}

/// A plant actuator that discards the output. Used where the caller reads
/// `tick`'s return value directly instead of letting the controller drive
/// hardware.
pub struct NoActuator;
impl PlantActuator for NoActuator {
    fn apply(&mut self, _u: f32) {}
}

/// Proportional / integral / derivative / feed-forward gains.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidGains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
    pub f: f32,
}

/// A PID controller closed over a feedback sensor, an optional feed-forward
/// sensor, and an optional plant actuator.
pub struct PidController<S, F = NoFeedForward, A = NoActuator>
where
    S: FeedbackSensor,
    F: FeedForwardSensor,
    A: PlantActuator,
{
    sensor: S,
    feed_forward: F,
    actuator: A,
    gains: PidGains,
    setpoint: f32,
    bias: f32,
    u_lb: f32,
    u_ub: f32,
    min_tick_interval_ms: u64,
    next_deadline_ms: u64,
    last_input: f32,
    integral: DiscreteIntegral,
    derivative: DiscreteDerivative,
}

impl<S, F, A> PidController<S, F, A>
where
    S: FeedbackSensor,
    F: FeedForwardSensor,
    A: PlantActuator,
{
    /// Constructs a controller. `u_lb`/`u_ub` are the input clamp bounds;
    /// `min_tick_interval_ms` is the minimum time between effective ticks
    /// (dwell, §4.4 step 1 / Testable Property 6); `filter_span_ms` sizes the
    /// derivative's sliding window.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gains: PidGains,
        sensor: S,
        feed_forward: F,
        actuator: A,
        u_lb: f32,
        u_ub: f32,
        min_tick_interval_ms: u64,
        filter_span_ms: u32,
    ) -> Self {
        Self {
            sensor,
            feed_forward,
            actuator,
            gains,
            setpoint: 0.0,
            bias: 0.0,
            u_lb,
            u_ub,
            min_tick_interval_ms,
            next_deadline_ms: 0,
            last_input: 0.0,
            integral: DiscreteIntegral::new(u_lb, u_ub),
            derivative: DiscreteDerivative::new(filter_span_ms, 0),
        }
    }

    /// Updates the setpoint. Takes effect on the next tick.
    pub fn update_setpoint(&mut self, setpoint: f32) {
        self.setpoint = setpoint;
    }

    /// Updates the bias term added to every tick's output.
    pub fn update_bias(&mut self, bias: f32) {
        self.bias = bias;
    }

    /// Zeroes the integral and derivative windows. Does not touch the
    /// cached last input or the setpoint.
    pub fn reset(&mut self) {
        self.integral.reset();
        self.derivative.reset();
    }

    /// Runs one control tick. If `now_ms` is before the next-tick deadline,
    /// returns the cached last input without touching the sensor, the
    /// integral/derivative windows, or the actuator (§4.4 step 1, Testable
    /// Property 6).
    pub fn tick(&mut self, now_ms: u64) -> f32 {
        if now_ms < self.next_deadline_ms {
            return self.last_input;
        }

        let x = self.sensor.read();
        let error = self.setpoint - x;

        let u_p = self.gains.p * error;
        let u_ff = self.gains.f * self.feed_forward.read();
        let u_b = self.bias;

        let u_i = if self.gains.i != 0.0 {
            let headroom = self.u_lb - u_p - u_b - u_ff;
            let lb = headroom / self.gains.i;
            let ub = (self.u_ub - u_p - u_b - u_ff) / self.gains.i;
            // K_i's sign may flip which bound is smaller; set_bounds doesn't
            // care about order since `clamp` needs lb <= ub.
            let (lb, ub) = if lb <= ub { (lb, ub) } else { (ub, lb) };
            self.integral.set_bounds(lb, ub);
            self.integral.add(now_ms as i64, error);
            self.gains.i * self.integral.read()
        } else {
            0.0
        };

        let u_d = if self.gains.d != 0.0 {
            self.derivative.add(now_ms as i64, x);
            self.gains.d * self.derivative.read()
        } else {
            0.0
        };

        let u = (u_p + u_i + u_d + u_ff + u_b).clamp(self.u_lb, self.u_ub);
        self.last_input = u;
        self.actuator.apply(u);
        self.next_deadline_ms = now_ms + self.min_tick_interval_ms;
        u
    }

    /// True iff the feedback sensor's *current* reading is within `tol` of
    /// the setpoint (re-reads the sensor, does not use the cached input).
    pub fn at_setpoint(&mut self, tol: f32) -> bool {
        (self.sensor.read() - self.setpoint).abs() <= tol
    }

    /// The most recently computed (and clamped) controller output.
    pub fn last_input(&self) -> f32 {
        self.last_input
    }

    /// Mutable access to the feedback sensor, for embedders that push fresh
    /// readings in rather than owning a live peripheral handle (e.g. the
    /// orchestrator's boiler sensor, which arrives as a plain tick argument).
    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstSensor(f32);
    impl FeedbackSensor for ConstSensor {
        fn read(&mut self) -> f32 {
            self.0
        }
    }

    struct RecordingActuator(f32);
    impl PlantActuator for RecordingActuator {
        fn apply(&mut self, u: f32) {
            self.0 = u;
        }
    }

    #[test]
    fn output_is_always_within_clamp_even_with_aggressive_gains() {
        let gains = PidGains { p: 0.0, i: 1000.0, d: 0.0, f: 0.0 };
        let mut pid = PidController::new(
            gains,
            ConstSensor(0.0),
            NoFeedForward,
            RecordingActuator(0.0),
            -1.0,
            1.0,
            0,
            1000,
        );
        pid.update_setpoint(100.0);
        let mut now = 0u64;
        for _ in 0..50 {
            let u = pid.tick(now);
            assert!((-1.0..=1.0).contains(&u), "u={u} escaped clamp");
            now += 10;
        }
    }

    #[test]
    fn dwell_returns_cached_value_without_reading_sensor_again() {
        struct CountingSensor {
            reads: u32,
        }
        impl FeedbackSensor for CountingSensor {
            fn read(&mut self) -> f32 {
                self.reads += 1;
                10.0
            }
        }
        let gains = PidGains { p: 1.0, i: 0.0, d: 0.0, f: 0.0 };
        let mut pid = PidController::new(
            gains,
            CountingSensor { reads: 0 },
            NoFeedForward,
            NoActuator,
            -100.0,
            100.0,
            1_000,
            1_000,
        );
        pid.update_setpoint(20.0);
        let first = pid.tick(0);
        let second = pid.tick(500); // within min_tick_interval_ms
        assert_eq!(first, second);
    }

    #[test]
    fn at_setpoint_uses_fresh_sensor_reading() {
        let gains = PidGains::default();
        let mut pid = PidController::new(
            gains,
            ConstSensor(98.0),
            NoFeedForward,
            NoActuator,
            -100.0,
            100.0,
            0,
            1000,
        );
        pid.update_setpoint(100.0);
        assert!(pid.at_setpoint(2.5));
        assert!(!pid.at_setpoint(1.0));
    }

    #[test]
    fn reset_zeroes_integral_and_derivative_but_not_last_input() {
        let gains = PidGains { p: 1.0, i: 1.0, d: 0.0, f: 0.0 };
        let mut pid = PidController::new(
            gains,
            ConstSensor(0.0),
            NoFeedForward,
            NoActuator,
            -100.0,
            100.0,
            0,
            1000,
        );
        pid.update_setpoint(10.0);
        pid.tick(0);
        let before_reset = pid.last_input();
        pid.reset();
        assert_eq!(pid.last_input(), before_reset);
    }
}
