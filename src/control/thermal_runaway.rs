//! Thermal-runaway safety watcher (§4.8).
//!
//! Grounded on `thermal_runaway_watcher.h`/`.c`. A small state machine that
//! classifies boiler behaviour against a setpoint and raises one of three
//! error states if the boiler isn't behaving plausibly. Entering any error
//! state is the orchestrator's cue to trigger emergency stop (§4.13, §7).

/// Default thresholds (§6), in 1/16 °C except `progress_window_ms`.
pub const DEFAULT_MAX_STEP_CHANGE: u16 = 16;
pub const DEFAULT_CONVERGENCE_TOL: u16 = 2;
pub const DEFAULT_DIVERGENCE_LIMIT: u16 = 10;
pub const DEFAULT_MIN_HEAT_STEP: u16 = 4;
pub const DEFAULT_MIN_COOL_STEP: u16 = 2;
pub const DEFAULT_PROGRESS_WINDOW_MS: u32 = 10_000;

/// The watcher's classification of current boiler behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThermalRunawayState {
    Off,
    Heating,
    Cooling,
    Converged,
    ErrorDiverged,
    ErrorFailedToConverge,
    ErrorLargeTempJump,
}

impl ThermalRunawayState {
    /// True for any of the three error variants.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::ErrorDiverged | Self::ErrorFailedToConverge | Self::ErrorLargeTempJump
        )
    }
}

/// Watches a boiler's (setpoint, temperature) trajectory for runaway
/// behaviour.
pub struct ThermalRunawayWatcher {
    state: ThermalRunawayState,
    setpoint: u16,
    temp: i16,
    max_step_change: u16,
    convergence_tol: u16,
    divergence_limit: u16,
    min_heat_step: u16,
    min_cool_step: u16,
    progress_window_ms: u32,
    progress_target: i16,
    progress_deadline_ms: u64,
}

impl ThermalRunawayWatcher {
    /// Constructs a watcher starting in `Off` state.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        max_step_change: u16,
        convergence_tol: u16,
        divergence_limit: u16,
        min_heat_step: u16,
        min_cool_step: u16,
        progress_window_ms: u32,
    ) -> Self {
        Self {
            state: ThermalRunawayState::Off,
            setpoint: 0,
            temp: 0,
            max_step_change,
            convergence_tol,
            divergence_limit,
            min_heat_step,
            min_cool_step,
            progress_window_ms,
            progress_target: 0,
            progress_deadline_ms: 0,
        }
    }

    /// The watcher's current state.
    pub fn state(&self) -> ThermalRunawayState {
        self.state
    }

    /// Advances the watcher one tick given `now_ms` (monotonic), `setpoint`
    /// (0 means off), and `temp`.
    pub fn tick(&mut self, now_ms: u64, setpoint: u16, temp: i16) -> ThermalRunawayState {
        if setpoint == 0 {
            self.state = ThermalRunawayState::Off;
        } else if !self.state.is_error() {
            if self.setpoint == 0 {
                // Just switched on: adopt the current temp without treating
                // it as a step change.
                self.temp = temp;
            }

            let progressing = matches!(
                self.state,
                ThermalRunawayState::Heating | ThermalRunawayState::Cooling
            );
            if progressing && now_ms >= self.progress_deadline_ms {
                self.state = ThermalRunawayState::ErrorFailedToConverge;
            } else if temp.abs_diff(self.temp) > self.max_step_change {
                self.state = ThermalRunawayState::ErrorLargeTempJump;
            } else if self.setpoint != setpoint
                || (self.state == ThermalRunawayState::Heating && temp >= self.progress_target)
                || (self.state == ThermalRunawayState::Cooling && temp <= self.progress_target)
            {
                if self.setpoint != setpoint {
                    self.state = if (temp as i32) < setpoint as i32 {
                        ThermalRunawayState::Heating
                    } else {
                        ThermalRunawayState::Cooling
                    };
                }
                match self.state {
                    ThermalRunawayState::Heating => {
                        self.progress_target = temp.saturating_add(self.min_heat_step as i16);
                    }
                    ThermalRunawayState::Cooling => {
                        self.progress_target = temp.saturating_sub(self.min_cool_step as i16);
                    }
                    _ => {}
                }
                self.progress_deadline_ms = now_ms + self.progress_window_ms as u64;
            }

            if self.state == ThermalRunawayState::Heating
                && temp as i32 >= setpoint as i32 - self.convergence_tol as i32
            {
                self.state = ThermalRunawayState::Converged;
            } else if self.state == ThermalRunawayState::Cooling
                && (temp as i32) <= setpoint as i32 + self.convergence_tol as i32
            {
                self.state = ThermalRunawayState::Converged;
            } else if self.state == ThermalRunawayState::Converged
                && ((temp as i32) < setpoint as i32 - self.divergence_limit as i32
                    || (temp as i32) > setpoint as i32 + self.divergence_limit as i32)
            {
                self.state = ThermalRunawayState::ErrorDiverged;
            }
        }

        self.setpoint = setpoint;
        self.temp = temp;
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The reference 32-step fixture from the authoritative firmware's own
    /// self-test (`thermal_runaway_watcher_test`), parameters
    /// `(10, 2, 10, 4, 2, 1000)`. `delay` is the elapsed time, in ms, since
    /// the previous step.
    struct Step {
        delay_ms: u64,
        setpoint: u16,
        temp: i16,
        expect: ThermalRunawayState,
    }

    #[test]
    fn reference_fixture_32_steps() {
        use ThermalRunawayState::*;
        let steps = [
            Step { delay_ms: 0, setpoint: 0, temp: 23, expect: Off },
            Step { delay_ms: 0, setpoint: 0, temp: 25, expect: Off },
            Step { delay_ms: 0, setpoint: 0, temp: 65, expect: Off },
            Step { delay_ms: 0, setpoint: 0, temp: 0, expect: Off },
            Step { delay_ms: 0, setpoint: 0, temp: 23, expect: Off },
            Step { delay_ms: 0, setpoint: 95, temp: 23, expect: Heating },
            Step { delay_ms: 100, setpoint: 95, temp: 25, expect: Heating },
            Step { delay_ms: 950, setpoint: 95, temp: 25, expect: ErrorFailedToConverge },
            Step { delay_ms: 0, setpoint: 95, temp: 30, expect: ErrorFailedToConverge },
            Step { delay_ms: 0, setpoint: 0, temp: 30, expect: Off },
            Step { delay_ms: 0, setpoint: 95, temp: 23, expect: Heating },
            Step { delay_ms: 500, setpoint: 95, temp: 25, expect: Heating },
            Step { delay_ms: 450, setpoint: 95, temp: 27, expect: Heating },
            Step { delay_ms: 100, setpoint: 95, temp: 25, expect: Heating },
            Step { delay_ms: 100, setpoint: 95, temp: 94, expect: ErrorLargeTempJump },
            Step { delay_ms: 0, setpoint: 0, temp: 94, expect: Off },
            Step { delay_ms: 0, setpoint: 95, temp: 94, expect: Converged },
            Step { delay_ms: 1100, setpoint: 95, temp: 94, expect: Converged },
            Step { delay_ms: 0, setpoint: 95, temp: 96, expect: Converged },
            Step { delay_ms: 0, setpoint: 95, temp: 96, expect: Converged },
            Step { delay_ms: 0, setpoint: 95, temp: 90, expect: Converged },
            Step { delay_ms: 0, setpoint: 95, temp: 84, expect: ErrorDiverged },
            Step { delay_ms: 0, setpoint: 0, temp: 84, expect: Off },
            Step { delay_ms: 0, setpoint: 85, temp: 84, expect: Converged },
            Step { delay_ms: 0, setpoint: 75, temp: 84, expect: Cooling },
            Step { delay_ms: 0, setpoint: 75, temp: 83, expect: Cooling },
            Step { delay_ms: 1010, setpoint: 75, temp: 83, expect: ErrorFailedToConverge },
            Step { delay_ms: 0, setpoint: 0, temp: 83, expect: Off },
            Step { delay_ms: 0, setpoint: 75, temp: 83, expect: Cooling },
            Step { delay_ms: 900, setpoint: 75, temp: 80, expect: Cooling },
            Step { delay_ms: 150, setpoint: 75, temp: 80, expect: Cooling },
            Step { delay_ms: 0, setpoint: 75, temp: 77, expect: Converged },
        ];

        let mut trw = ThermalRunawayWatcher::new(10, 2, 10, 4, 2, 1000);
        let mut now_ms: u64 = 0;
        for (i, step) in steps.iter().enumerate() {
            now_ms += step.delay_ms;
            let state = trw.tick(now_ms, step.setpoint, step.temp);
            assert_eq!(
                state, step.expect,
                "step {} (1-indexed): expected {:?}, got {:?}",
                i + 1,
                step.expect,
                state
            );
        }
    }

    #[test]
    fn condensed_testable_property_scenarios() {
        // Property 7's condensed scenarios, each freshly set up.
        let mut trw = ThermalRunawayWatcher::new(16, 2, 10, 4, 2, 10_000);
        assert_eq!(trw.tick(0, 0, 23), ThermalRunawayState::Off);

        let mut trw = ThermalRunawayWatcher::new(16, 2, 10, 4, 2, 1000);
        trw.tick(0, 1520, 23);
        trw.tick(100, 1520, 25);
        assert_eq!(
            trw.tick(1050, 1520, 25),
            ThermalRunawayState::ErrorFailedToConverge
        );

        let mut trw = ThermalRunawayWatcher::new(16, 2, 10, 4, 2, 10_000);
        trw.tick(0, 1520, 94);
        assert_eq!(trw.tick(1100, 1520, 94), ThermalRunawayState::Converged);

        let mut trw = ThermalRunawayWatcher::new(16, 2, 10, 4, 2, 10_000);
        trw.tick(0, 1520, 94);
        assert_eq!(trw.tick(0, 1520, 84), ThermalRunawayState::ErrorDiverged);

        let mut trw = ThermalRunawayWatcher::new(16, 2, 10, 4, 2, 10_000);
        trw.tick(0, 1520, 25);
        assert_eq!(
            trw.tick(100, 1520, 94),
            ThermalRunawayState::ErrorLargeTempJump
        );
    }
}
