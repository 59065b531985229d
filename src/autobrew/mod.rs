//! Multi-leg autobrew routine executor (§4.9).
//!
//! Grounded on `machine_logic/autobrew.h`/`.c`. A routine is a sequence of up
//! to 16 legs; each leg runs 0-3 setup hooks once, then ramps a linear
//! setpoint through an optional mapping function to a pump power until a
//! timeout or a registered trigger fires. `tick` loops through any legs that
//! finish (or have a zero timeout) within a single call, mirroring the
//! source's `while(_autobrew_leg_tick())` -- a zero-timeout leg is a no-op
//! pass-through, not a leg that runs for one tick.
//!
//! `elapsed_ds` is the real time, in deciseconds, that has passed since the
//! previous `tick` call -- the source instead tracks an absolute deadline
//! (`make_timeout_time_ms`); the caller accumulates milliseconds into whole
//! deciseconds itself and passes 0 on calls where none has elapsed yet, so a
//! leg's timeout and setpoint ramp always track wall-clock time regardless
//! of how often `tick` is called.

use heapless::Vec;

pub const MAX_LEGS: usize = 16;
pub const MAX_SETUP_HOOKS: usize = 3;
pub const MAX_TRIGGERS: usize = 3;
pub const MAX_MAPPINGS: usize = 3;
pub const MAX_PUMP_POWER: u8 = 100;

/// Identifies a registered mapping function.
pub type MappingId = u8;
/// Identifies a registered trigger function.
pub type TriggerId = u8;
/// Identifies a registered setup hook.
pub type SetupHookId = u8;

/// One leg of an autobrew routine.
#[derive(Debug, Clone, Copy)]
pub struct AutobrewLeg {
    /// `None` uses the setpoint directly as the pump power.
    pub mapping_id: Option<MappingId>,
    pub setpoint_start: u16,
    pub setpoint_end: u16,
    /// Leg duration, in deciseconds. 0 disables the leg (passed through
    /// within the same `tick` call).
    pub timeout_ds: u16,
    /// Bit `i` set means setup hook `i` runs once at the start of this leg.
    setup_flags: u8,
    /// Per-trigger threshold; 0 means that trigger slot is disabled for
    /// this leg.
    trigger_vals: [u16; MAX_TRIGGERS],
}

impl AutobrewLeg {
    fn new(mapping_id: Option<MappingId>, setpoint_start: u16, setpoint_end: u16, timeout_ds: u16) -> Self {
        Self {
            mapping_id,
            setpoint_start,
            setpoint_end,
            timeout_ds,
            setup_flags: 0,
            trigger_vals: [0; MAX_TRIGGERS],
        }
    }

    fn enable_setup_hook(&mut self, id: SetupHookId, enable: bool) {
        let bit = 1u8 << id;
        if enable {
            self.setup_flags |= bit;
        } else {
            self.setup_flags &= !bit;
        }
    }

    fn set_trigger(&mut self, id: TriggerId, trigger_val: u16) {
        self.trigger_vals[id as usize] = trigger_val;
    }

    fn setpoint_at(&self, elapsed_ds: u32) -> u16 {
        let timeout_ds = self.timeout_ds as u32;
        if elapsed_ds >= timeout_ds {
            return self.setpoint_end;
        }
        let span = self.setpoint_end as i32 - self.setpoint_start as i32;
        let remaining_ds = timeout_ds - elapsed_ds;
        let delta = (span as i64 * remaining_ds as i64) / timeout_ds.max(1) as i64;
        (self.setpoint_end as i32 - delta as i32) as u16
    }
}

/// The environment an autobrew routine's setup hooks, triggers, and mappings
/// act on. The crate defines no concrete environment: the embedder supplies
/// one (typically wrapping the PID controllers and sensors being driven) and
/// implements the three function-pointer tables against it.
pub struct AutobrewRoutine<Env> {
    legs: Vec<AutobrewLeg, MAX_LEGS>,
    setup_hooks: [Option<fn(&mut Env)>; MAX_SETUP_HOOKS],
    triggers: [Option<fn(&mut Env, u16) -> bool>; MAX_TRIGGERS],
    mappings: [Option<fn(&mut Env, u16) -> u8>; MAX_MAPPINGS],
    current_leg: usize,
    leg_elapsed_ds: u32,
    leg_started: bool,
    current_power: u8,
    pump_changed: bool,
}

impl<Env> Default for AutobrewRoutine<Env> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Env> AutobrewRoutine<Env> {
    pub fn new() -> Self {
        Self {
            legs: Vec::new(),
            setup_hooks: [None; MAX_SETUP_HOOKS],
            triggers: [None; MAX_TRIGGERS],
            mappings: [None; MAX_MAPPINGS],
            current_leg: 0,
            leg_elapsed_ds: 0,
            leg_started: false,
            current_power: 0,
            pump_changed: false,
        }
    }

    /// Registers a setup hook under `id` (0-2), overwriting any existing
    /// registration at that slot.
    pub fn register_setup_hook(&mut self, id: SetupHookId, hook: fn(&mut Env)) {
        self.setup_hooks[id as usize] = Some(hook);
    }

    /// Registers a trigger under `id` (0-2).
    pub fn register_trigger(&mut self, id: TriggerId, trigger: fn(&mut Env, u16) -> bool) {
        self.triggers[id as usize] = Some(trigger);
    }

    /// Registers a mapping under `id` (0-2).
    pub fn register_mapping(&mut self, id: MappingId, mapping: fn(&mut Env, u16) -> u8) {
        self.mappings[id as usize] = Some(mapping);
    }

    /// Clears all configured legs (but not the registered hooks/triggers/
    /// mappings) and resets execution state.
    pub fn clear_routine(&mut self) {
        self.legs.clear();
        self.reset();
    }

    /// Appends a leg. Returns its index, or `Err(leg)` if the routine is
    /// already at `MAX_LEGS` capacity.
    pub fn add_leg(
        &mut self,
        mapping_id: Option<MappingId>,
        setpoint_start: u16,
        setpoint_end: u16,
        timeout_ds: u16,
    ) -> Result<usize, AutobrewLeg> {
        let leg = AutobrewLeg::new(mapping_id, setpoint_start, setpoint_end, timeout_ds);
        match self.legs.push(leg) {
            Ok(()) => Ok(self.legs.len() - 1),
            Err(leg) => Err(leg),
        }
    }

    /// Enables or disables setup hook `hook_id` for leg `leg_id`.
    pub fn configure_leg_setup_hook(&mut self, leg_id: usize, hook_id: SetupHookId, enable: bool) {
        if let Some(leg) = self.legs.get_mut(leg_id) {
            leg.enable_setup_hook(hook_id, enable);
        }
    }

    /// Sets the end-trigger threshold for `trigger_id` on leg `leg_id`. A
    /// `trigger_val` of 0 disables that trigger slot for this leg.
    pub fn configure_leg_trigger(&mut self, leg_id: usize, trigger_id: TriggerId, trigger_val: u16) {
        if let Some(leg) = self.legs.get_mut(leg_id) {
            leg.set_trigger(trigger_id, trigger_val);
        }
    }

    /// Runs one tick of the routine, advancing the current leg's elapsed
    /// time by `elapsed_ds` real deciseconds. Returns `true` once the
    /// routine has finished (on this call or an earlier one). Advancing
    /// through zero-timeout or already-satisfied-trigger legs happens within
    /// this single call, same as the source; `elapsed_ds` is only ever
    /// applied once per call, to whichever leg is current when the call
    /// starts -- legs passed through afterward consume none of it.
    pub fn tick(&mut self, env: &mut Env, elapsed_ds: u32) -> bool {
        let previous_power = self.current_power;
        let mut budget = elapsed_ds;
        while self.tick_current_leg(env, &mut budget) {}
        self.pump_changed = self.current_power != previous_power;
        self.finished()
    }

    /// Advances the current leg. `budget` holds the real elapsed deciseconds
    /// still unspent this call; it is folded into the leg's elapsed time at
    /// most once (the first leg touched this call) and zeroed after, so
    /// pass-through legs reached later in the same call don't also advance.
    /// Returns `true` if the caller should immediately re-tick (the leg just
    /// finished and there may be more legs to pass through), `false` once
    /// there's genuine work left to do this tick or the routine has fully
    /// finished.
    fn tick_current_leg(&mut self, env: &mut Env, budget: &mut u32) -> bool {
        if self.current_leg == self.legs.len() {
            self.current_power = 0;
            return false;
        }

        if !self.leg_started {
            self.leg_started = true;
            self.leg_elapsed_ds = 0;
            let leg = self.legs[self.current_leg];
            for (i, hook) in self.setup_hooks.iter().enumerate() {
                if leg.setup_flags & (1 << i) != 0 {
                    if let Some(hook) = hook {
                        hook(env);
                    }
                }
            }
        }

        self.leg_elapsed_ds = self.leg_elapsed_ds.saturating_add(*budget);
        *budget = 0;

        let leg = self.legs[self.current_leg];
        let mut leg_finished = self.leg_elapsed_ds >= leg.timeout_ds as u32;
        if !leg_finished {
            for (i, trigger) in self.triggers.iter().enumerate() {
                let val = leg.trigger_vals[i];
                if val > 0 {
                    if let Some(trigger) = trigger {
                        if trigger(env, val) {
                            leg_finished = true;
                            break;
                        }
                    }
                }
            }
        }

        if leg_finished {
            self.current_leg += 1;
            self.leg_started = false;
            self.current_power = 0;
            return true;
        }

        let setpoint = leg.setpoint_at(self.leg_elapsed_ds);
        self.current_power = match leg.mapping_id {
            None => setpoint.min(MAX_PUMP_POWER as u16) as u8,
            Some(id) => match self.mappings[id as usize] {
                Some(mapping) => mapping(env, setpoint).min(MAX_PUMP_POWER),
                None => 0,
            },
        };
        false
    }

    /// The pump power the routine currently commands, in `[0, 100]`.
    pub fn pump_power(&self) -> u8 {
        self.current_power
    }

    /// True if the pump power changed on the most recent `tick` call.
    pub fn pump_changed(&self) -> bool {
        self.pump_changed
    }

    /// The index of the currently executing leg, or `None` if finished.
    pub fn current_leg(&self) -> Option<usize> {
        if self.finished() {
            None
        } else {
            Some(self.current_leg)
        }
    }

    pub fn finished(&self) -> bool {
        self.current_leg == self.legs.len()
    }

    /// Restarts the routine from the first leg.
    pub fn reset(&mut self) {
        self.current_leg = 0;
        self.leg_elapsed_ds = 0;
        self.leg_started = false;
        self.current_power = 0;
        self.pump_changed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Env {
        setup_calls: u32,
    }

    #[test]
    fn straight_mapping_leg_runs_to_timeout() {
        let mut routine: AutobrewRoutine<Env> = AutobrewRoutine::new();
        routine.add_leg(None, 50, 50, 5).unwrap();
        let mut env = Env { setup_calls: 0 };
        let mut finished = false;
        for _ in 0..10 {
            // 1 decisecond of real time per tick, matching a real caller's
            // ms-accumulated elapsed_ds.
            finished = routine.tick(&mut env, 1);
            if finished {
                break;
            }
        }
        assert!(finished);
        assert_eq!(routine.pump_power(), 0);
        assert_eq!(routine.current_leg(), None);
    }

    #[test]
    fn zero_timeout_leg_is_skipped_within_one_tick() {
        let mut routine: AutobrewRoutine<Env> = AutobrewRoutine::new();
        routine.add_leg(None, 10, 10, 0).unwrap();
        routine.add_leg(None, 20, 20, 5).unwrap();
        let mut env = Env { setup_calls: 0 };
        let finished = routine.tick(&mut env, 0);
        assert!(!finished);
        assert_eq!(routine.current_leg(), Some(1));
    }

    #[test]
    fn setup_hook_runs_exactly_once_at_leg_start() {
        fn bump(env: &mut Env) {
            env.setup_calls += 1;
        }
        let mut routine: AutobrewRoutine<Env> = AutobrewRoutine::new();
        routine.register_setup_hook(0, bump);
        routine.add_leg(None, 10, 10, 3).unwrap();
        routine.configure_leg_setup_hook(0, 0, true);
        let mut env = Env { setup_calls: 0 };
        routine.tick(&mut env, 0);
        routine.tick(&mut env, 0);
        routine.tick(&mut env, 0);
        assert_eq!(env.setup_calls, 1);
    }

    #[test]
    fn trigger_ends_leg_before_timeout() {
        fn always_trip(_env: &mut Env, _val: u16) -> bool {
            true
        }
        let mut routine: AutobrewRoutine<Env> = AutobrewRoutine::new();
        routine.register_trigger(0, always_trip);
        routine.add_leg(None, 10, 10, 100).unwrap();
        routine.configure_leg_trigger(0, 0, 1);
        let mut env = Env { setup_calls: 0 };
        let finished = routine.tick(&mut env, 0);
        assert!(finished);
    }

    #[test]
    fn mapping_function_is_applied_and_clamped() {
        fn double_but_capped(_env: &mut Env, setpoint: u16) -> u8 {
            (setpoint * 2).min(255) as u8
        }
        let mut routine: AutobrewRoutine<Env> = AutobrewRoutine::new();
        routine.register_mapping(0, double_but_capped);
        routine.add_leg(Some(0), 60, 60, 10).unwrap();
        let mut env = Env { setup_calls: 0 };
        routine.tick(&mut env, 0);
        assert_eq!(routine.pump_power(), MAX_PUMP_POWER);
    }

    #[test]
    fn reset_restarts_from_the_first_leg() {
        let mut routine: AutobrewRoutine<Env> = AutobrewRoutine::new();
        routine.add_leg(None, 10, 10, 1).unwrap();
        let mut env = Env { setup_calls: 0 };
        while !routine.tick(&mut env, 1) {}
        assert!(routine.finished());
        routine.reset();
        assert_eq!(routine.current_leg(), Some(0));
    }

    #[test]
    fn leg_timing_tracks_real_elapsed_time_not_call_count() {
        // Leg A: 1 s (10 ds). Leg B: 2 s (20 ds). Calling tick() far more
        // often than once per decisecond, with elapsed_ds mostly 0 and
        // occasionally 1 (as a real caller accumulating ms into deciseconds
        // would), must not advance the legs any faster than real time does.
        let mut routine: AutobrewRoutine<Env> = AutobrewRoutine::new();
        routine.add_leg(None, 10, 10, 10).unwrap();
        routine.add_leg(None, 20, 20, 20).unwrap();
        let mut env = Env { setup_calls: 0 };

        // 50 calls at elapsed_ds=0 (sub-decisecond ticks): no progress.
        for _ in 0..50 {
            routine.tick(&mut env, 0);
        }
        assert_eq!(routine.current_leg(), Some(0));

        // 9 more deciseconds of real time: still leg A (9 < 10).
        for _ in 0..9 {
            routine.tick(&mut env, 1);
        }
        assert_eq!(routine.current_leg(), Some(0));

        // The 10th decisecond ends leg A and enters leg B.
        routine.tick(&mut env, 1);
        assert_eq!(routine.current_leg(), Some(1));

        // 19 more deciseconds: still leg B (19 < 20).
        for _ in 0..19 {
            routine.tick(&mut env, 1);
        }
        assert_eq!(routine.current_leg(), Some(1));

        // The 20th decisecond finishes the routine.
        assert!(routine.tick(&mut env, 1));
    }

    #[test]
    fn add_leg_rejects_past_capacity() {
        let mut routine: AutobrewRoutine<Env> = AutobrewRoutine::new();
        for _ in 0..MAX_LEGS {
            routine.add_leg(None, 0, 0, 1).unwrap();
        }
        assert!(routine.add_leg(None, 0, 0, 1).is_err());
    }
}
