//! Discrete derivative: least-squares slope over a sliding time window (§4.5).
//!
//! Grounded on `pid.h`/`pid.c`'s `discrete_derivative`. `t` is tracked in
//! milliseconds but the returned slope is value-units per *second*, so the
//! closed-form least-squares slope (computed in v-per-ms) is scaled ×1000 on
//! read.
//!
//! The ring starts at 16 entries and doubles when full in the source (never
//! shrinks). To keep the running quadratic sums from overflowing over a long
//! run, the window is periodically "rebased": when the newest point's
//! origin-relative `t` or `v` exceeds `(1 << 24) - 1`, the current head
//! becomes the new origin and every stored point -- plus the quadratic sums
//! -- is re-derived relative to it.

use heapless::Vec;

/// Threshold (in origin-relative units) past which the window rebases its
/// origin. `(1 << 24) - 1`, matching `DISCRETE_DERIVATIVE_SHIFT_AT_VAL`.
const SHIFT_AT_VAL: f64 = ((1i64 << 24) - 1) as f64;

/// heapless::Vec has a fixed compile-time capacity; the source's "double
/// when full" ring growth is modeled here by a single upper bound chosen
/// comfortably above any filter_span_ms/sample_rate_ms combination this
/// firmware configures. If that capacity is ever reached, the oldest point
/// is evicted to make room rather than the sample being dropped.
const MAX_CAPACITY: usize = 256;

#[derive(Clone, Copy)]
struct Point {
    t: f64,
    v: f64,
}

/// A sliding-window least-squares discrete derivative.
pub struct DiscreteDerivative {
    points: Vec<Point, MAX_CAPACITY>,
    filter_span_ms: u32,
    sample_rate_ms: u32,
    origin_t: f64,
    origin_v: f64,
    sum_t: f64,
    sum_v: f64,
    sum_tv: f64,
    sum_tt: f64,
}

impl DiscreteDerivative {
    /// `filter_span_ms` is the oldest kept age; `sample_rate_ms` is the
    /// minimum gap between accepted points.
    pub fn new(filter_span_ms: u32, sample_rate_ms: u32) -> Self {
        Self {
            points: Vec::new(),
            filter_span_ms,
            sample_rate_ms,
            origin_t: 0.0,
            origin_v: 0.0,
            sum_t: 0.0,
            sum_v: 0.0,
            sum_tv: 0.0,
            sum_tt: 0.0,
        }
    }

    /// Drops all points and resets the origin, without changing configuration.
    pub fn reset(&mut self) {
        self.points.clear();
        self.origin_t = 0.0;
        self.origin_v = 0.0;
        self.sum_t = 0.0;
        self.sum_v = 0.0;
        self.sum_tv = 0.0;
        self.sum_tt = 0.0;
    }

    /// Adds a new `(t_ms, v)` datapoint, in absolute (non-origin-relative)
    /// units.
    ///
    /// Rejects the point if fewer than `sample_rate_ms` have passed since the
    /// newest stored point (the very first point is always accepted).
    pub fn add(&mut self, t_ms: i64, v: f32) {
        let t_ms = t_ms as f64;
        let v = v as f64;

        if let Some(last) = self.points.last() {
            let last_t_abs = last.t + self.origin_t;
            if (t_ms - last_t_abs) < self.sample_rate_ms as f64 {
                return;
            }
        }

        // Evict points older than filter_span_ms behind the incoming point,
        // but never drop below 2 points.
        while self.points.len() >= 2 {
            let head = self.points[0];
            let head_t_abs = head.t + self.origin_t;
            if (t_ms - head_t_abs) > self.filter_span_ms as f64 {
                self.remove_point(0);
            } else {
                break;
            }
        }

        let rel_t = t_ms - self.origin_t;
        let rel_v = v - self.origin_v;

        let point = Point { t: rel_t, v: rel_v };
        if self.points.push(point).is_err() {
            self.remove_point(0);
            let _ = self.points.push(point);
        }
        self.sum_t += rel_t;
        self.sum_v += rel_v;
        self.sum_tv += rel_t * rel_v;
        self.sum_tt += rel_t * rel_t;

        if rel_t.abs() > SHIFT_AT_VAL || rel_v.abs() > SHIFT_AT_VAL {
            self.rebase();
        }
    }

    fn remove_point(&mut self, idx: usize) {
        let p = self.points.remove(idx);
        self.sum_t -= p.t;
        self.sum_v -= p.v;
        self.sum_tv -= p.t * p.v;
        self.sum_tt -= p.t * p.t;
    }

    /// Re-origins the window at the current head, per §4.5/§9's rebasing
    /// discipline: the quadratic sums are re-derived from the shifted
    /// points; the linear sums follow algebraically from the same shift.
    fn rebase(&mut self) {
        let Some(&head) = self.points.first() else {
            return;
        };
        let shift_t = head.t;
        let shift_v = head.v;
        self.origin_t += shift_t;
        self.origin_v += shift_v;

        let mut sum_t = 0.0;
        let mut sum_v = 0.0;
        let mut sum_tv = 0.0;
        let mut sum_tt = 0.0;
        for p in self.points.iter_mut() {
            p.t -= shift_t;
            p.v -= shift_v;
            sum_t += p.t;
            sum_v += p.v;
            sum_tv += p.t * p.v;
            sum_tt += p.t * p.t;
        }
        self.sum_t = sum_t;
        self.sum_v = sum_v;
        self.sum_tv = sum_tv;
        self.sum_tt = sum_tt;
    }

    /// The number of points currently stored.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Reads the least-squares slope in value-units per second. Returns 0
    /// exactly for 0 or 1 stored points.
    pub fn read(&self) -> f32 {
        let n = self.points.len() as f64;
        if n < 2.0 {
            return 0.0;
        }
        let numerator = n * self.sum_tv - self.sum_t * self.sum_v;
        let denominator = n * self.sum_tt - self.sum_t * self.sum_t;
        if denominator == 0.0 {
            return 0.0;
        }
        // slope is in value-per-ms; scale by 1000 for value-per-second.
        (1000.0 * numerator / denominator) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_or_single_point_reads_zero() {
        let mut d = DiscreteDerivative::new(10_000, 0);
        assert_eq!(d.read(), 0.0);
        d.add(0, 10.0);
        assert_eq!(d.read(), 0.0);
    }

    #[test]
    fn recovers_known_slope() {
        let mut d = DiscreteDerivative::new(60_000, 0);
        // v = 2*t (t in seconds), sampled every 100ms.
        for i in 0..50 {
            let t_ms = i * 100;
            let t_s = t_ms as f32 / 1000.0;
            d.add(t_ms as i64, 2.0 * t_s);
        }
        assert_relative_eq!(d.read(), 2.0, epsilon = 1e-2);
    }

    #[test]
    fn rejects_points_faster_than_sample_rate() {
        let mut d = DiscreteDerivative::new(10_000, 500);
        d.add(0, 0.0);
        d.add(100, 100.0); // too soon, rejected
        assert_eq!(d.len(), 1);
        d.add(600, 100.0); // accepted
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn evicts_points_older_than_filter_span_but_keeps_at_least_two() {
        let mut d = DiscreteDerivative::new(1_000, 0);
        d.add(0, 0.0);
        d.add(500, 1.0);
        d.add(1_100, 2.0); // should evict t=0, not t=500
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn rebase_does_not_change_the_computed_slope() {
        let mut a = DiscreteDerivative::new(600_000, 0);
        let mut b = DiscreteDerivative::new(600_000, 0);
        for i in 0..40 {
            let t_ms = i * 1000;
            let v = 3.0 * (t_ms as f32 / 1000.0);
            a.add(t_ms as i64, v);
            b.add(t_ms as i64, v);
        }
        // Force a rebase on `a` only by pushing a point with a huge relative
        // value jump.
        a.add(40_000, 1.0e8);
        b.add(40_000, 1.0e8);
        assert_relative_eq!(a.read(), b.read(), epsilon = 1.0);
    }
}
