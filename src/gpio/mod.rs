//! GPIO event fan-out and debouncing infrastructure (§4.1, §4.2).
//!
//! The physical GPIO peripheral is out of scope (§1); this module only
//! models the *dispatch* and *debounce* logic layered on top of it. The
//! embedder is expected to call [`GpioDispatch::dispatch`] from its own
//! interrupt handler whenever a watched pin edges.

pub mod debounce;
pub mod dispatch;
pub mod timestamp;

pub use debounce::{DebouncedInput, InputReading, PullDirection};
pub use dispatch::{DispatchTarget, Edge, GpioDispatch};
pub use timestamp::TimestampLedger;

/// Identifies a physical pin by its embedder-assigned index.
///
/// The crate never talks to a GPIO peripheral directly, so a pin is just the
/// small integer the embedder uses to identify it across dispatch,
/// timestamping, and debounce.
pub type PinId = u8;
