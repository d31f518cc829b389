//! Dual-source lap clock

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, trace};

/// Which source, if any, is advancing the lap clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ClockState {
    #[default]
    Stopped,

    /// Advanced by the local ticker.
    RunningInternal,

    /// Set from the simulator's reported lap time.
    RunningExternal,
}

impl ClockState {
    pub fn is_running(self) -> bool {
        !matches!(self, ClockState::Stopped)
    }
}

/// Lap clock state machine.
///
/// One field says which source owns the clock, so the clock can never be
/// advanced by the local ticker while the simulator is writing it. The caller
/// owns the actual timer and must only deliver [`TimingArbiter::tick`] while the
/// state is [`ClockState::RunningInternal`]; ticks in other states are ignored.
#[derive(Debug, Clone)]
pub struct TimingArbiter {
    state: ClockState,
    elapsed_ms: u64,
    best_ms: Option<u64>,
    step_ms: u64,
}

impl TimingArbiter {
    /// Clock advancing by `tick` per local tick.
    pub fn new(tick: Duration) -> Self {
        let step_ms = u64::try_from(tick.as_millis()).unwrap_or(u64::MAX).max(1);
        Self { state: ClockState::Stopped, elapsed_ms: 0, best_ms: None, step_ms }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Fastest lap captured since the last reset.
    pub fn best_ms(&self) -> Option<u64> {
        self.best_ms
    }

    /// Start the local stopwatch. No-op when already running.
    pub fn start(&mut self) -> bool {
        if self.state.is_running() {
            return false;
        }
        self.transition(ClockState::RunningInternal);
        true
    }

    /// Stop the clock, keeping its value. No-op when stopped.
    pub fn stop(&mut self) -> bool {
        if !self.state.is_running() {
            return false;
        }
        self.transition(ClockState::Stopped);
        true
    }

    /// Stop and zero the clock and forget the best lap.
    pub fn reset(&mut self) {
        self.transition(ClockState::Stopped);
        self.elapsed_ms = 0;
        self.best_ms = None;
    }

    /// Capture the current clock value as a lap and restart it from zero.
    ///
    /// While running the clock keeps running from the same source. A stopped
    /// clock holding a value can still be captured; a stopped clock at zero
    /// has nothing to capture and returns `None`.
    pub fn lap(&mut self) -> Option<u64> {
        if !self.state.is_running() && self.elapsed_ms == 0 {
            return None;
        }

        let lap_ms = self.elapsed_ms;
        self.elapsed_ms = 0;
        self.best_ms = Some(self.best_ms.map_or(lap_ms, |best| best.min(lap_ms)));

        debug!("Lap captured: {}ms (best {:?})", lap_ms, self.best_ms);
        Some(lap_ms)
    }

    /// Apply a lap time reported by the simulator.
    ///
    /// Only strictly positive values are authoritative; anything else is
    /// ignored without touching the clock or the state.
    pub fn external_time_received(&mut self, ms: i64) -> bool {
        let Ok(ms) = u64::try_from(ms) else {
            return false;
        };
        if ms == 0 {
            return false;
        }

        self.elapsed_ms = ms;
        self.transition(ClockState::RunningExternal);
        true
    }

    /// The simulator stopped feeding time. A running clock carries on locally
    /// from its last value.
    pub fn connection_lost(&mut self) {
        if self.state == ClockState::RunningExternal {
            self.transition(ClockState::RunningInternal);
        }
    }

    /// Advance the local stopwatch by one step.
    pub fn tick(&mut self) -> bool {
        if self.state != ClockState::RunningInternal {
            trace!("Ignoring tick while {:?}", self.state);
            return false;
        }
        self.elapsed_ms = self.elapsed_ms.saturating_add(self.step_ms);
        true
    }

    fn transition(&mut self, next: ClockState) {
        if self.state != next {
            debug!("Clock {:?} -> {:?} at {}ms", self.state, next, self.elapsed_ms);
            self.state = next;
        }
    }
}

impl Default for TimingArbiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}
