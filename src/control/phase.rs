//! Zero-cross AC phase control (§4.3).
//!
//! Grounded on `phasecontrol.h`/`.c`. On each zero-cross edge matching the
//! configured polarity, the channel debounces against the mains half-period,
//! records the crossing, and -- if the duty index is non-zero -- reports the
//! two one-shot alarm deadlines the embedder's timer must schedule: an
//! off-alarm 3/4 period after the (shifted) crossing, and an on-alarm at
//! `DUTY_TIMEOUTS_US[duty]` after it. The embedder owns the actual hardware
//! alarm/timer peripheral (out of scope, §1); this channel only computes
//! *when*.

use crate::time::{DurationUs, TimestampUs};

/// Mains half-period debounce/lockout, and the off-alarm offset from a
/// zero-cross (3/4 of a 60Hz period).
const PERIOD_0_75_US: DurationUs = 12_500;

/// One full mains period at 60Hz.
const PERIOD_1_00_US: DurationUs = 16_667;

/// `is_ac_hot` margin added to one mains period.
const AC_HOT_MARGIN_US: DurationUs = 100;

/// Energy-equalized duty lookup: index 0 delays the on-alarm the longest
/// (fully off), index 127 the least (full on). Spacing equalizes the area
/// under one mains half-cycle, not time.
pub const DUTY_TIMEOUTS_US: [u16; 128] = [
    8333, 7862, 7666, 7515, 7387, 7274, 7171, 7076, 6987, 6904, 6824, 6749, 6676, 6606, 6538, 6472,
    6408, 6346, 6286, 6226, 6168, 6112, 6056, 6001, 5947, 5895, 5842, 5791, 5740, 5690, 5641, 5592,
    5544, 5496, 5448, 5401, 5355, 5309, 5263, 5217, 5172, 5127, 5083, 5039, 4995, 4951, 4907, 4864,
    4821, 4778, 4735, 4692, 4650, 4607, 4565, 4523, 4481, 4439, 4397, 4355, 4313, 4271, 4229, 4188,
    4146, 4104, 4062, 4020, 3979, 3937, 3895, 3853, 3811, 3768, 3726, 3684, 3641, 3598, 3556, 3513,
    3469, 3426, 3382, 3339, 3295, 3250, 3206, 3161, 3116, 3071, 3025, 2979, 2932, 2885, 2838, 2790,
    2741, 2693, 2643, 2593, 2542, 2491, 2439, 2386, 2332, 2277, 2222, 2165, 2107, 2048, 1987, 1925,
    1861, 1795, 1728, 1658, 1585, 1509, 1430, 1346, 1257, 1162, 1060, 947, 819, 668, 471, 0,
];

/// Maximum duty index (table length - 1).
pub const MAX_DUTY: u8 = 127;

/// The mains edge the channel is configured to trigger on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ZeroCrossEdge {
    Rising,
    Falling,
}

/// The alarms to schedule in response to an accepted zero-cross, given as
/// delays from the raw (unshifted) edge timestamp passed to
/// [`PhaseControlChannel::on_zero_cross`] -- the configured `shift_us` is
/// already folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmPlan {
    /// Delay at which the embedder must drive the output low.
    pub off_delay_us: DurationUs,
    /// Delay at which the embedder must drive the output high.
    pub on_delay_us: DurationUs,
}

/// One AC phase-control channel.
pub struct PhaseControlChannel {
    edge: ZeroCrossEdge,
    shift_us: i32,
    last_zero_cross: Option<TimestampUs>,
    duty: u8,
}

impl PhaseControlChannel {
    /// Creates a channel triggering on `edge`, with a detector propagation
    /// `shift_us` (may be negative).
    pub fn new(edge: ZeroCrossEdge, shift_us: i32) -> Self {
        Self {
            edge,
            shift_us,
            last_zero_cross: None,
            duty: 0,
        }
    }

    /// Sets the duty index, clipped to [0, 127].
    pub fn set_duty(&mut self, duty: u8) {
        self.duty = duty.min(MAX_DUTY);
    }

    /// The current duty index.
    pub fn duty(&self) -> u8 {
        self.duty
    }

    fn shifted_delay(&self, base_delay_us: u64) -> DurationUs {
        if self.shift_us >= 0 {
            base_delay_us.saturating_add(self.shift_us as u64)
        } else {
            base_delay_us.saturating_sub((-self.shift_us) as u64)
        }
    }

    /// Call from the embedder's ISR when a zero-cross edge matching `fired`
    /// occurs at `now`. Returns the alarm plan to schedule, or `None` if the
    /// edge was rejected by the debounce lockout, didn't match the
    /// configured polarity, or duty is 0 (output stays low, no alarms
    /// needed).
    pub fn on_zero_cross(&mut self, fired: ZeroCrossEdge, now: TimestampUs) -> Option<AlarmPlan> {
        if fired != self.edge {
            return None;
        }
        if let Some(last) = self.last_zero_cross {
            if now.saturating_sub(last) < PERIOD_0_75_US {
                return None;
            }
        }
        self.last_zero_cross = Some(now);

        if self.duty == 0 {
            return None;
        }

        Some(AlarmPlan {
            off_delay_us: self.shifted_delay(PERIOD_0_75_US),
            on_delay_us: self.shifted_delay(DUTY_TIMEOUTS_US[self.duty as usize] as DurationUs),
        })
    }

    /// True iff the last accepted zero-cross was within one mains period (+
    /// margin) of `now`. A stale or absent zero-cross keeps this false.
    pub fn is_ac_hot(&self, now: TimestampUs) -> bool {
        match self.last_zero_cross {
            Some(last) => now.saturating_sub(last) < PERIOD_1_00_US + AC_HOT_MARGIN_US,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_table_is_energy_monotonic_and_bounds_correct() {
        assert_eq!(DUTY_TIMEOUTS_US[0], 8333);
        assert_eq!(DUTY_TIMEOUTS_US[127], 0);
        for w in DUTY_TIMEOUTS_US.windows(2) {
            assert!(w[0] >= w[1], "timeout table must be non-increasing");
        }
    }

    #[test]
    fn zero_duty_schedules_no_alarms() {
        let mut ch = PhaseControlChannel::new(ZeroCrossEdge::Rising, 0);
        ch.set_duty(0);
        assert_eq!(ch.on_zero_cross(ZeroCrossEdge::Rising, 100_000), None);
    }

    #[test]
    fn nonzero_duty_schedules_off_then_on() {
        let mut ch = PhaseControlChannel::new(ZeroCrossEdge::Rising, 0);
        ch.set_duty(64);
        let plan = ch.on_zero_cross(ZeroCrossEdge::Rising, 100_000).unwrap();
        assert_eq!(plan.off_delay_us, 12_500);
        assert_eq!(plan.on_delay_us, DUTY_TIMEOUTS_US[64] as u64);
    }

    #[test]
    fn debounce_rejects_edges_within_three_quarter_period() {
        let mut ch = PhaseControlChannel::new(ZeroCrossEdge::Rising, 0);
        ch.set_duty(64);
        assert!(ch.on_zero_cross(ZeroCrossEdge::Rising, 0).is_some());
        assert_eq!(ch.on_zero_cross(ZeroCrossEdge::Rising, 10_000), None);
        assert!(ch.on_zero_cross(ZeroCrossEdge::Rising, 16_667).is_some());
    }

    #[test]
    fn wrong_edge_polarity_is_ignored() {
        let mut ch = PhaseControlChannel::new(ZeroCrossEdge::Rising, 0);
        ch.set_duty(64);
        assert_eq!(ch.on_zero_cross(ZeroCrossEdge::Falling, 0), None);
    }

    #[test]
    fn is_ac_hot_false_until_a_crossing_is_seen_and_stays_true_within_one_period() {
        let mut ch = PhaseControlChannel::new(ZeroCrossEdge::Rising, 0);
        assert!(!ch.is_ac_hot(0));
        ch.set_duty(1);
        ch.on_zero_cross(ZeroCrossEdge::Rising, 0);
        assert!(ch.is_ac_hot(16_766));
        assert!(!ch.is_ac_hot(16_768));
    }

    #[test]
    fn set_duty_clips_to_127() {
        let mut ch = PhaseControlChannel::new(ZeroCrossEdge::Rising, 0);
        ch.set_duty(200);
        assert_eq!(ch.duty(), 127);
    }
}
