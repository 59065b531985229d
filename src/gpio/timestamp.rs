//! Per-pin edge timestamp ledger (§4.1).
//!
//! Grounded on `gpio_irq_timestamp.h`/`.c`. Used both for debouncing (§4.2)
//! and AC-hot detection (§4.3). Writing a timestamp from interrupt context is
//! a single-word store; readers tolerate a small race, per §3/§5 — there is
//! no lock here by design.

use super::PinId;
use crate::time::{DurationUs, TimestampUs};

/// Records the last-edge timestamp for up to `N` watched pins.
pub struct TimestampLedger<const N: usize> {
    last_edge: [Option<TimestampUs>; N],
}

impl<const N: usize> TimestampLedger<N> {
    /// Creates a ledger with no recorded edges.
    pub const fn new() -> Self {
        Self {
            last_edge: [None; N],
        }
    }

    /// Interrupt-context entry point: records `now` as the last edge time for
    /// `pin`. A single-word store; safe to call from an ISR.
    pub fn record(&mut self, pin: PinId, now: TimestampUs) {
        if let Some(slot) = self.last_edge.get_mut(pin as usize) {
            *slot = Some(now);
        }
    }

    /// The raw last-edge timestamp for `pin`, or `None` if no edge has been
    /// recorded yet.
    pub fn last(&self, pin: PinId) -> Option<TimestampUs> {
        self.last_edge.get(pin as usize).copied().flatten()
    }

    /// Microseconds since the last recorded edge on `pin`, as of `now`, or
    /// `None` if no edge has been recorded yet.
    pub fn since(&self, pin: PinId, now: TimestampUs) -> Option<DurationUs> {
        self.last(pin).map(|t| now.saturating_sub(t))
    }
}

impl<const N: usize> Default for TimestampLedger<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecorded_pin_reads_none() {
        let ledger: TimestampLedger<4> = TimestampLedger::new();
        assert_eq!(ledger.last(1), None);
        assert_eq!(ledger.since(1, 1_000), None);
    }

    #[test]
    fn records_and_reads_duration_since() {
        let mut ledger: TimestampLedger<4> = TimestampLedger::new();
        ledger.record(2, 1_000);
        assert_eq!(ledger.last(2), Some(1_000));
        assert_eq!(ledger.since(2, 1_500), Some(500));
    }

    #[test]
    fn out_of_range_pin_is_ignored() {
        let mut ledger: TimestampLedger<2> = TimestampLedger::new();
        ledger.record(9, 1_000);
        assert_eq!(ledger.last(9), None);
    }
}
