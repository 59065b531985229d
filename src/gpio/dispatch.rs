//! Multi-subscriber GPIO event dispatch (§4.1).
//!
//! Grounded on `gpio_multi_callback.h`/`.c`: a pin-indexed array of
//! subscriber lists, where each subscriber carries an edge mask and is
//! invoked only when the fired edge matches. The original uses a single
//! dynamically-grown array of `{fun, events, data}` per pin and a shared ISR
//! that fans out to all of them; this crate keeps the fan-out but closes the
//! subscriber set to a small enum (§9's "tagged function reference" design
//! note) instead of an arbitrary function pointer, since every subscriber in
//! this firmware is one of exactly three kinds.

use super::PinId;
use heapless::Vec;

/// The edge(s) a subscriber wants to be notified of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    fn matches(self, fired: Edge) -> bool {
        matches!((self, fired), (Edge::Both, _) | (Edge::Rising, Edge::Rising) | (Edge::Falling, Edge::Falling))
    }
}

/// What a subscriber is watching a pin for. The dispatcher threads the
/// opaque index straight through to whichever subsystem owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchTarget {
    /// Forward the edge to the timestamp ledger for this pin.
    Timestamp,
    /// Forward the edge to a zero-cross phase-control channel, identified by
    /// its index in the embedder's channel table.
    ZeroCross(u8),
    /// Forward the edge to a debounced binary input, identified by its index
    /// in the embedder's input table.
    Debounce(u8),
}

#[derive(Clone, Copy)]
struct Subscription {
    edge: Edge,
    target: DispatchTarget,
}

/// Maximum subscribers on a single pin. Three is enough for every pin this
/// firmware watches (at most: timestamp ledger + zero-cross channel, or
/// timestamp ledger + debounce input).
const MAX_SUBSCRIBERS_PER_PIN: usize = 3;

/// Per-pin subscriber table, fanning a fired edge out to every interested
/// subscriber.
///
/// `N` is the number of distinct pins this dispatcher watches.
pub struct GpioDispatch<const N: usize> {
    subscriptions: [Vec<Subscription, MAX_SUBSCRIBERS_PER_PIN>; N],
}

impl<const N: usize> GpioDispatch<N> {
    /// Creates an empty dispatcher for `N` pins (indexed 0..N).
    pub fn new() -> Self {
        Self {
            subscriptions: core::array::from_fn(|_| Vec::new()),
        }
    }

    /// Registers `target` to be notified when `pin` fires an edge matching
    /// `edge`. Returns `false` if the pin index is out of range or its
    /// subscriber list is full.
    pub fn subscribe(&mut self, pin: PinId, edge: Edge, target: DispatchTarget) -> bool {
        match self.subscriptions.get_mut(pin as usize) {
            Some(list) => list.push(Subscription { edge, target }).is_ok(),
            None => false,
        }
    }

    /// Call from the embedder's ISR when `pin` fires `fired`. Invokes `on_fire`
    /// once per matching subscriber, in subscription order.
    ///
    /// This is the single interrupt-context entry point; `on_fire` must only
    /// perform the narrow, single-word mutations permitted from ISR context
    /// (§3, §5) -- typically recording a timestamp or arming an alarm.
    pub fn dispatch(&self, pin: PinId, fired: Edge, mut on_fire: impl FnMut(DispatchTarget)) {
        if let Some(list) = self.subscriptions.get(pin as usize) {
            for sub in list.iter() {
                if sub.edge.matches(fired) {
                    on_fire(sub.target);
                }
            }
        }
    }
}

impl<const N: usize> Default for GpioDispatch<N> {
    fn default() -> Self {
        Self::new()
    }
}
