//! Core value types shared across the crate.
//!
//! - [`TelemetrySnapshot`] and [`Gear`] describe one decoded sample
//! - [`TelemetryFrame`] is a full decoded frame including the simulator's lap time
//! - [`CapturedLap`] and [`LapRecord`] are a captured lap and its storage shape
//! - [`UpdateRate`] controls how often view streams emit

mod lap;
mod snapshot;
mod update_rate;

pub use lap::{CapturedLap, LapRecord, SessionContext, SessionKind};
pub use snapshot::{Gear, SimInfo, TelemetryFrame, TelemetrySnapshot};
pub use update_rate::UpdateRate;
