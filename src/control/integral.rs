//! Discrete integral: clamped trapezoidal running sum (§4.6).
//!
//! Grounded on `pid.h`/`pid.c`'s `discrete_integral`. The running sum folds
//! in the trapezoid rule's factor-of-two so `read` only has to divide once:
//! `sum += (v_prev + v_new) * dt_ms`, `read = sum / 2`. Bounds passed to
//! `set_bounds`/`new` are in the unscaled domain and are scaled ×2 on store.
//! The original's `/2000.0` also unscales a ×1000 fixed-point encoding of
//! `v` that this f64 implementation has no need for; reduced to just the
//! trapezoid factor, that division is by 2, not 2000.

const SCALE: f64 = 2.0;

/// A trapezoidal running integral with external, mutable clamp bounds.
pub struct DiscreteIntegral {
    last: Option<(i64, f32)>,
    sum: f64,
    lower_bound_scaled: f64,
    upper_bound_scaled: f64,
}

impl DiscreteIntegral {
    /// Creates an integral clamped to `[lower_bound, upper_bound]`.
    pub fn new(lower_bound: f32, upper_bound: f32) -> Self {
        Self {
            last: None,
            sum: 0.0,
            lower_bound_scaled: lower_bound as f64 * SCALE,
            upper_bound_scaled: upper_bound as f64 * SCALE,
        }
    }

    /// Clears the running sum and the last-seen point.
    pub fn reset(&mut self) {
        self.last = None;
        self.sum = 0.0;
    }

    /// Updates the clamp bounds. Takes effect on the next `read`; used by
    /// the PID controller to implement anti-windup (§4.4 step 7).
    pub fn set_bounds(&mut self, lower_bound: f32, upper_bound: f32) {
        self.lower_bound_scaled = lower_bound as f64 * SCALE;
        self.upper_bound_scaled = upper_bound as f64 * SCALE;
    }

    /// Adds a new `(t_ms, v)` datapoint. The very first call only records the
    /// point and contributes 0 to the sum.
    pub fn add(&mut self, t_ms: i64, v: f32) {
        if let Some((last_t, last_v)) = self.last {
            let dt_ms = (t_ms - last_t) as f64;
            self.sum += (last_v as f64 + v as f64) * dt_ms;
        }
        self.last = Some((t_ms, v));
    }

    /// Reads the current clamped integral value, in value-units per second.
    pub fn read(&self) -> f32 {
        self.sum
            .clamp(self.lower_bound_scaled, self.upper_bound_scaled)
            / SCALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn first_add_contributes_zero() {
        let mut i = DiscreteIntegral::new(-1000.0, 1000.0);
        i.add(0, 5.0);
        assert_eq!(i.read(), 0.0);
    }

    #[test]
    fn trapezoidal_rule_matches_constant_rate_integration() {
        let mut i = DiscreteIntegral::new(-1_000_000.0, 1_000_000.0);
        // constant value 2.0 held for a 1000ms step: sum = (2+2)*1000 = 4000,
        // read = sum/2 = 2000.
        i.add(0, 2.0);
        i.add(1000, 2.0);
        assert_relative_eq!(i.read(), 2000.0, epsilon = 1e-6);
    }

    #[test]
    fn clamps_to_bounds() {
        let mut i = DiscreteIntegral::new(-1.0, 1.0);
        i.add(0, 100.0);
        i.add(1000, 100.0);
        assert_eq!(i.read(), 1.0);
    }

    #[test]
    fn reset_zeroes_sum() {
        let mut i = DiscreteIntegral::new(-1000.0, 1000.0);
        i.add(0, 2.0);
        i.add(1000, 2.0);
        i.reset();
        assert_eq!(i.read(), 0.0);
    }

    #[test]
    fn bounds_update_applies_to_next_read() {
        let mut i = DiscreteIntegral::new(-1000.0, 1000.0);
        i.add(0, 10.0);
        i.add(1000, 10.0);
        i.set_bounds(-2.0, 2.0);
        assert_eq!(i.read(), 2.0);
    }
}
