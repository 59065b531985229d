//! Crate-wide error type.
//!
//! Mirrors the teacher driver's `Error<SpiE, PinE>` shape: instead of
//! erasing the embedder's hardware error types, the underlying cause is
//! threaded through as a generic parameter so a caller can still match on it.
//!
//! Only I/O-backed operations are fallible here, matching the original
//! firmware: `pid_tick`, `thermal_runaway_watcher_tick`, `autobrew_*_tick`,
//! and the phase/PWM/derivative/integral math never fail in the source and
//! so return plain values in this crate. The persistent store (FRAM) and
//! anything built on top of it (settings load/save, machine setup) are the
//! only operations that can fail, since they cross an I/O boundary.

/// Errors produced by this crate.
///
/// `StoreE` is the error type of the embedder's
/// [`crate::settings::PersistentStore`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<StoreE> {
    /// A persistent-store read or write failed.
    Store(StoreE),
    /// Setup-time configuration was invalid (e.g. an out-of-range pin set).
    InvalidConfig,
    /// A console byte did not map to a known [`crate::console::UiCommand`].
    InvalidCommand,
    /// An index passed to a fixed-capacity registry (leg, trigger, mapping,
    /// setup-hook, folder child) was out of range.
    IndexOutOfRange,
    /// A fixed-capacity collection (autobrew legs, folder children, ...) is
    /// already full.
    CapacityExceeded,
}

impl<StoreE> Error<StoreE> {
    /// Wraps a persistent-store error.
    pub fn store(e: StoreE) -> Self {
        Error::Store(e)
    }
}

impl<StoreE> From<StoreE> for Error<StoreE> {
    fn from(e: StoreE) -> Self {
        Error::Store(e)
    }
}
