//! Local stopwatch timer

use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::trace;

use super::ClockState;

/// Periodic timer driving the local stopwatch.
///
/// Holds an interval only while the clock runs internally. [`LocalTicker::sync`]
/// drops or installs it to match the clock state; the driver calls it after
/// every handled event, so a tick can never fire for a clock the simulator
/// has taken over.
#[derive(Debug)]
pub struct LocalTicker {
    period: Duration,
    interval: Option<Interval>,
}

impl LocalTicker {
    pub fn new(period: Duration) -> Self {
        Self { period, interval: None }
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    /// Match the timer to `state`.
    pub fn sync(&mut self, state: ClockState) {
        let wanted = state == ClockState::RunningInternal;

        if wanted && self.interval.is_none() {
            trace!("Local ticker started ({:?})", self.period);
            let mut interval = interval_at(Instant::now() + self.period, self.period);
            // Missed ticks are delivered late rather than dropped so the
            // stopwatch stays close to wall-clock time.
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            self.interval = Some(interval);
        } else if !wanted && self.interval.take().is_some() {
            trace!("Local ticker cleared");
        }
    }

    /// Wait for the next tick. Pends forever while the ticker is inactive.
    ///
    /// Cancel safe.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}
