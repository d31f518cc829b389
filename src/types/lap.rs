//! Captured laps and the record shape handed to lap storage

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of session a lap was driven in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Qualifying,
    #[default]
    Race,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Qualifying => f.write_str("qualifying"),
            SessionKind::Race => f.write_str("race"),
        }
    }
}

impl std::str::FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qualifying" | "quali" | "q" => Ok(SessionKind::Qualifying),
            "race" | "r" => Ok(SessionKind::Race),
            other => Err(format!("unknown session kind '{other}'")),
        }
    }
}

/// The circuit/car pairing laps are being recorded for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub circuit_id: String,
    pub car: String,
    pub kind: SessionKind,
}

impl SessionContext {
    pub fn new(circuit_id: impl Into<String>, car: impl Into<String>, kind: SessionKind) -> Self {
        Self { circuit_id: circuit_id.into(), car: car.into(), kind }
    }
}

/// A lap time captured during a live session. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedLap {
    /// Capture order within the session, starting at 1
    pub seq: u64,
    pub elapsed_ms: u64,
    pub circuit_id: String,
    pub car: String,
    pub session_kind: SessionKind,
    pub timestamp: DateTime<Utc>,
}

impl CapturedLap {
    /// The shape lap storage expects.
    pub fn record(&self) -> LapRecord {
        LapRecord {
            circuit_id: self.circuit_id.clone(),
            time: self.elapsed_ms,
            date: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            kind: self.session_kind,
            car_model: self.car.clone(),
        }
    }
}

/// Lap as submitted to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LapRecord {
    pub circuit_id: String,
    /// Lap time in ms
    pub time: u64,
    /// ISO-8601 capture time
    pub date: String,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    pub car_model: String,
}
