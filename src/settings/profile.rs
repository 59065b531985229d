//! The active settings array and the 9-slot profile store (§4.11).
//!
//! Grounded on `machine_settings.c`'s link/load/save dance, collapsed to
//! direct addressed reads/writes per [`super::store::PersistentStore`].
//! Address 0 holds the active block; profile `k` (1-indexed, 1..=9) lives at
//! `k * BLOCK_SIZE`, for 10 total blocks.

use super::store::PersistentStore;
use super::table::{NUM_SETTINGS, SETTING_SPECS};
use crate::error::Error;

/// Bytes per setting slot (a little-endian `i32`).
const SETTING_WIDTH: usize = 4;

/// Bytes occupied by one full settings block (the active array, or one
/// profile).
pub const BLOCK_SIZE: usize = NUM_SETTINGS * SETTING_WIDTH;

pub const ACTIVE_ADDR: u16 = 0;
pub const NUM_PROFILES: u8 = 9;

/// The address of profile `k` (1..=9).
pub fn profile_addr(k: u8) -> u16 {
    debug_assert!((1..=NUM_PROFILES).contains(&k));
    (k as u32 * BLOCK_SIZE as u32) as u16
}

/// The in-RAM mirror of the active settings array.
pub struct SettingsArray {
    values: [i32; NUM_SETTINGS],
}

impl Default for SettingsArray {
    fn default() -> Self {
        Self::defaults()
    }
}

impl SettingsArray {
    /// All settings at their spec default.
    pub fn defaults() -> Self {
        let mut values = [0; NUM_SETTINGS];
        for (v, spec) in values.iter_mut().zip(SETTING_SPECS.iter()) {
            *v = spec.default;
        }
        Self { values }
    }

    pub fn get(&self, idx: usize) -> i32 {
        self.values[idx]
    }

    /// Sets slot `idx`, clamped to its spec's `[min, max]`.
    pub fn set_clamped(&mut self, idx: usize, value: i32) {
        let spec = SETTING_SPECS[idx];
        self.values[idx] = value.clamp(spec.min, spec.max);
    }

    /// Applies a signed delta scaled by the setting's `scale` to slot `idx`,
    /// then re-clamps. This is the action-folder edit semantics (§4.12):
    /// `delta` of -1/0/+1 for continuous settings means -10/0/+10 raw units
    /// (a full `scale` step), matching the distilled spec's rule that
    /// enumerated settings (scale == 1) instead move 1 raw unit per step.
    pub fn apply_delta(&mut self, idx: usize, delta: i32) {
        let spec = SETTING_SPECS[idx];
        let step = if spec.scale > 1 { spec.scale } else { 1 };
        self.set_clamped(idx, self.values[idx] + delta * step);
    }

    /// True iff every slot lies within its spec's bounds.
    pub fn is_valid(&self) -> bool {
        self.values
            .iter()
            .zip(SETTING_SPECS.iter())
            .all(|(v, spec)| spec.in_range(*v))
    }

    fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        for (i, v) in self.values.iter().enumerate() {
            buf[i * SETTING_WIDTH..(i + 1) * SETTING_WIDTH].copy_from_slice(&v.to_le_bytes());
        }
        buf
    }

    fn from_bytes(buf: &[u8; BLOCK_SIZE]) -> Self {
        let mut values = [0i32; NUM_SETTINGS];
        for (i, v) in values.iter_mut().enumerate() {
            let mut b = [0u8; SETTING_WIDTH];
            b.copy_from_slice(&buf[i * SETTING_WIDTH..(i + 1) * SETTING_WIDTH]);
            *v = i32::from_le_bytes(b);
        }
        Self { values }
    }

    /// Loads the active block from the store. If any slot is out of range,
    /// the entire array is reset to defaults and those defaults are written
    /// back, matching the source's "load validates, auto-rewrites defaults
    /// on any invalid value" rule.
    pub fn load_active<S: PersistentStore>(store: &mut S) -> Result<Self, Error<S::Error>> {
        Self::load_block(store, ACTIVE_ADDR)
    }

    /// Writes the active array to the store.
    pub fn save_active<S: PersistentStore>(&self, store: &mut S) -> Result<(), Error<S::Error>> {
        store.write(ACTIVE_ADDR, &self.to_bytes()).map_err(Error::store)
    }

    /// Loads profile `k` (1..=9) as the new active array, validating exactly
    /// as [`Self::load_active`] does. Does not itself touch the active
    /// block in the store; the caller installs the returned array and saves
    /// it if persistence of the swap is desired.
    pub fn load_profile<S: PersistentStore>(store: &mut S, k: u8) -> Result<Self, Error<S::Error>> {
        Self::load_block(store, profile_addr(k))
    }

    /// Saves the active array to profile slot `k` (1..=9).
    pub fn save_to_profile<S: PersistentStore>(&self, store: &mut S, k: u8) -> Result<(), Error<S::Error>> {
        store.write(profile_addr(k), &self.to_bytes()).map_err(Error::store)
    }

    fn load_block<S: PersistentStore>(store: &mut S, addr: u16) -> Result<Self, Error<S::Error>> {
        let mut buf = [0u8; BLOCK_SIZE];
        store.read(addr, &mut buf).map_err(Error::store)?;
        let loaded = Self::from_bytes(&buf);
        if loaded.is_valid() {
            Ok(loaded)
        } else {
            let defaults = Self::defaults();
            store.write(addr, &defaults.to_bytes()).map_err(Error::store)?;
            Ok(defaults)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::store::test_support::FakeStore;
    use super::super::table::ScalarSetting;
    use super::*;

    #[test]
    fn fresh_store_loads_as_defaults_and_is_valid() {
        let mut store = FakeStore::new();
        let settings = SettingsArray::load_active(&mut store).unwrap();
        assert!(settings.is_valid());
        assert_eq!(
            settings.get(super::super::table::scalar_index(ScalarSetting::BrewTemp)),
            900
        );
    }

    #[test]
    fn save_then_mutate_then_load_restores_the_snapshot() {
        let mut store = FakeStore::new();
        let mut settings = SettingsArray::defaults();
        let idx = super::super::table::scalar_index(ScalarSetting::Dose);
        settings.set_clamped(idx, 180);
        settings.save_to_profile(&mut store, 3).unwrap();

        settings.set_clamped(idx, 50);
        assert_eq!(settings.get(idx), 50);

        let reloaded = SettingsArray::load_profile(&mut store, 3).unwrap();
        assert_eq!(reloaded.get(idx), 180);
    }

    #[test]
    fn corrupted_block_resets_whole_array_to_defaults() {
        let mut store = FakeStore::new();
        // Write a single out-of-range value directly into the active block.
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0..4].copy_from_slice(&9999i32.to_le_bytes());
        store.write(ACTIVE_ADDR, &buf).unwrap();

        let loaded = SettingsArray::load_active(&mut store).unwrap();
        assert!(loaded.is_valid());
        assert_eq!(loaded.get(0), SETTING_SPECS[0].default);
    }

    #[test]
    fn apply_delta_scales_by_the_setting_scale_and_clamps() {
        let mut settings = SettingsArray::defaults();
        let idx = super::super::table::scalar_index(ScalarSetting::BrewTemp);
        let before = settings.get(idx);
        settings.apply_delta(idx, 1);
        assert_eq!(settings.get(idx), before + SETTING_SPECS[idx].scale);
        settings.apply_delta(idx, 10_000);
        assert_eq!(settings.get(idx), SETTING_SPECS[idx].max);
    }
}
