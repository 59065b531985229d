//! The settings array's slot layout (§6).
//!
//! 7 scalar settings (boiler setpoints, scale thresholds, pump power per
//! mode) followed by 9 autobrew legs x 7 per-leg settings, matching the
//! distilled spec's table exactly. Each slot is a signed 32-bit value with a
//! fixed `(scale, min, max, default)` tuple recovered from the authoritative
//! source's sample entries and generalized to the repeating per-leg pattern.

pub const NUM_SCALAR_SETTINGS: usize = 7;
pub const NUM_LEGS: usize = 9;
pub const NUM_LEG_SETTINGS: usize = 7;
pub const NUM_SETTINGS: usize = NUM_SCALAR_SETTINGS + NUM_LEGS * NUM_LEG_SETTINGS;

/// A single setting's bounds. `scale` is the number of raw units per
/// displayed unit (e.g. scale=10 means raw value 900 displays as 90.0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingSpec {
    pub scale: i32,
    pub min: i32,
    pub max: i32,
    pub default: i32,
}

impl SettingSpec {
    pub const fn new(scale: i32, min: i32, max: i32, default: i32) -> Self {
        Self { scale, min, max, default }
    }

    pub fn in_range(&self, value: i32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Index of the scalar settings, in slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarSetting {
    BrewTemp = 0,
    HotTemp = 1,
    SteamTemp = 2,
    Dose = 3,
    Yield = 4,
    BrewPower = 5,
    HotPower = 6,
}

/// Index of a per-leg setting within a leg's 7-slot block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegSetting {
    RefStyle = 0,
    RefStart = 1,
    RefEnd = 2,
    TriggerFlow = 3,
    TriggerPressure = 4,
    TriggerMass = 5,
    TimeoutDs = 6,
}

const SCALAR_SPECS: [SettingSpec; NUM_SCALAR_SETTINGS] = [
    SettingSpec::new(10, 0, 1400, 900),  // brew temp, 0.1 C, default 90.0 C
    SettingSpec::new(10, 0, 1400, 850),  // hot-water temp, default 85.0 C
    SettingSpec::new(10, 0, 1600, 1450), // steam temp, default 145.0 C
    SettingSpec::new(10, 0, 300, 150),   // dose, 0.1 g, default 15.0 g
    SettingSpec::new(10, 0, 600, 300),   // yield, 0.1 g, default 30.0 g
    SettingSpec::new(1, 0, 100, 60),     // brew power, %
    SettingSpec::new(1, 0, 100, 100),    // hot-water power, %
];

const fn leg_specs_for(_leg: usize) -> [SettingSpec; NUM_LEG_SETTINGS] {
    [
        SettingSpec::new(1, -1, 1, 0),        // ref-style: -1 pressure, 0 power, 1 flow
        SettingSpec::new(1, 0, 100, 0),       // ref-start
        SettingSpec::new(1, 0, 100, 0),       // ref-end
        SettingSpec::new(100, 0, 1000, 0),    // trigger-flow, 0.01 ml/s, 0 = disabled
        SettingSpec::new(10, 0, 120, 0),      // trigger-pressure, 0.1 bar, 0 = disabled
        SettingSpec::new(10, 0, 600, 0),      // trigger-mass, 0.1 g, 0 = disabled
        SettingSpec::new(10, 0, 6000, 0),     // timeout, 0.1 s, 0 = disabled leg
    ]
}

const fn build_specs() -> [SettingSpec; NUM_SETTINGS] {
    let mut specs = [SettingSpec::new(1, 0, 0, 0); NUM_SETTINGS];
    let mut i = 0;
    while i < NUM_SCALAR_SETTINGS {
        specs[i] = SCALAR_SPECS[i];
        i += 1;
    }
    let mut leg = 0;
    while leg < NUM_LEGS {
        let leg_specs = leg_specs_for(leg);
        let mut j = 0;
        while j < NUM_LEG_SETTINGS {
            specs[NUM_SCALAR_SETTINGS + leg * NUM_LEG_SETTINGS + j] = leg_specs[j];
            j += 1;
        }
        leg += 1;
    }
    specs
}

/// The full 70-entry setting spec table, in slot order.
pub const SETTING_SPECS: [SettingSpec; NUM_SETTINGS] = build_specs();

/// The slot index of scalar setting `s`.
pub const fn scalar_index(s: ScalarSetting) -> usize {
    s as usize
}

/// The slot index of leg `leg` (0-8)'s setting `s`.
pub fn leg_index(leg: usize, s: LegSetting) -> usize {
    NUM_SCALAR_SETTINGS + leg * NUM_LEG_SETTINGS + s as usize
}
