//! Telemetry values decoded from bridge frames

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selected gear.
///
/// The bridge reports gears with an offset: `0` is reverse, `1` is neutral and
/// `N >= 2` is forward gear `N - 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gear {
    Reverse,
    #[default]
    Neutral,
    Forward(u8),
}

impl Gear {
    /// Map the bridge's raw gear integer to a gear.
    ///
    /// Negative values are treated as reverse.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            i32::MIN..=0 => Gear::Reverse,
            1 => Gear::Neutral,
            n => Gear::Forward(u8::try_from(n - 1).unwrap_or(u8::MAX)),
        }
    }

    /// Inverse of [`Gear::from_raw`].
    pub fn raw(self) -> i32 {
        match self {
            Gear::Reverse => 0,
            Gear::Neutral => 1,
            Gear::Forward(n) => i32::from(n) + 1,
        }
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gear::Reverse => f.write_str("R"),
            Gear::Neutral => f.write_str("N"),
            Gear::Forward(n) => write!(f, "{n}"),
        }
    }
}

/// One telemetry sample.
///
/// Replaced wholesale on every accepted frame, never merged field by field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Speed in km/h, rounded to the nearest integer
    pub speed_kmh: i32,
    pub gear: Gear,
    pub rpm: u32,
    /// Throttle position, 0.0 to 1.0
    pub throttle: f32,
    /// Brake position, 0.0 to 1.0
    pub brake: f32,
}

/// Optional session details some bridges send alongside the core sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimInfo {
    pub last_lap_ms: Option<i64>,
    pub best_lap_ms: Option<i64>,
    pub completed_laps: Option<u32>,
    pub position: Option<u32>,
    pub car_model: Option<String>,
    pub track: Option<String>,
    pub player_name: Option<String>,
    pub max_rpm: Option<u32>,
}

impl SimInfo {
    /// True when the frame carried none of the optional details.
    pub fn is_empty(&self) -> bool {
        *self == SimInfo::default()
    }
}

/// A decoded frame from a bridge with a running simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    pub snapshot: TelemetrySnapshot,

    /// Current lap time reported by the simulator in ms.
    /// Values `<= 0` mean the simulator has no lap time to offer.
    pub current_time_ms: i64,

    pub sim: SimInfo,
}

impl TelemetryFrame {
    /// The simulator's lap time, if it is authoritative right now.
    pub fn external_time(&self) -> Option<u64> {
        u64::try_from(self.current_time_ms).ok().filter(|ms| *ms > 0)
    }
}
