//! Lap clock: the state machine and the timer that drives it locally.

mod arbiter;
mod ticker;

pub use arbiter::{ClockState, TimingArbiter};
pub use ticker::LocalTicker;

/// Render a lap time as `MM:SS.cc`.
///
/// Minutes keep growing past 99 rather than wrapping.
pub fn format_lap_time(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms / 1000) % 60;
    let centis = (ms % 1000) / 10;
    format!("{minutes:02}:{seconds:02}.{centis:02}")
}
