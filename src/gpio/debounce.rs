//! Debounced binary input (§4.2).
//!
//! Grounded on `binary_input.h`/`.c`: N pins, a pull direction, an optional
//! invert, an optional mux, and a debounce window. A pin is "stable" once
//! the timestamp ledger reports its last edge at least `debounce_window` ago
//! (or the window is zero); unstable pins retain their previously-latched
//! value.

use super::timestamp::TimestampLedger;
use super::PinId;
use crate::time::{DurationUs, TimestampUs};
use heapless::Vec;

/// Which rail a pin idles at absent external drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PullDirection {
    Up,
    Down,
}

/// The result of reading a [`DebouncedInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputReading {
    /// Not muxed: the 1-based index of the first active pin, or 0 if none.
    Index(u8),
    /// Muxed: a bitmask of logical pin states, pin 0 in bit 0.
    Mask(u32),
}

/// A debounced group of up to `N` pins.
pub struct DebouncedInput<const N: usize> {
    pins: Vec<PinId, N>,
    pull: PullDirection,
    invert: bool,
    muxed: bool,
    debounce_window: DurationUs,
    /// Last-latched logical value per pin, held across bounces.
    latched: [bool; N],
}

impl<const N: usize> DebouncedInput<N> {
    /// Builds a debounced input over `pins`. `pins` longer than `N` is
    /// truncated to `N` entries.
    pub fn new(
        pins: &[PinId],
        pull: PullDirection,
        invert: bool,
        muxed: bool,
        debounce_window: DurationUs,
    ) -> Self {
        let mut v = Vec::new();
        for &p in pins.iter().take(N) {
            let _ = v.push(p);
        }
        Self {
            pins: v,
            pull,
            invert,
            muxed,
            debounce_window,
            latched: [false; N],
        }
    }

    /// The pins this input watches, in order.
    pub fn pins(&self) -> &[PinId] {
        &self.pins
    }

    fn logical_value(&self, raw_high: bool) -> bool {
        // Pull-up idles high (inactive = high), pull-down idles low.
        let active = match self.pull {
            PullDirection::Up => !raw_high,
            PullDirection::Down => raw_high,
        };
        if self.invert {
            !active
        } else {
            active
        }
    }

    /// Reads the debounced state. `raw` supplies the instantaneous (bouncy)
    /// logic level for a given pin; `ledger` must be the same ledger the
    /// embedder's ISR feeds edges for these pins into.
    pub fn read<const M: usize>(
        &mut self,
        ledger: &TimestampLedger<M>,
        now: TimestampUs,
        raw: impl Fn(PinId) -> bool,
    ) -> InputReading {
        for (i, &pin) in self.pins.iter().enumerate() {
            let stable = self.debounce_window == 0
                || ledger
                    .since(pin, now)
                    .map(|d| d >= self.debounce_window)
                    .unwrap_or(true);
            if stable {
                self.latched[i] = self.logical_value(raw(pin));
            }
            // else: retain the previous latched value.
        }

        if self.muxed {
            let mut mask = 0u32;
            for (i, &active) in self.latched.iter().take(self.pins.len()).enumerate() {
                if active {
                    mask |= 1 << i;
                }
            }
            InputReading::Mask(mask)
        } else {
            for (i, &active) in self.latched.iter().take(self.pins.len()).enumerate() {
                if active {
                    return InputReading::Index(i as u8 + 1);
                }
            }
            InputReading::Index(0)
        }
    }
}
