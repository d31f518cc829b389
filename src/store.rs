//! Latest telemetry as seen by the session

use tracing::trace;

use crate::types::{SimInfo, TelemetryFrame, TelemetrySnapshot};

/// Holds the most recent accepted sample.
///
/// Only accepted frames touch the snapshot; idle frames and rejected payloads
/// leave whatever was last shown in place.
#[derive(Debug, Clone, Default)]
pub struct TelemetryStore {
    snapshot: TelemetrySnapshot,
    sim: SimInfo,
    accepted: u64,
    idle: u64,
    bridge_message: Option<String>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot
    }

    pub fn sim(&self) -> &SimInfo {
        &self.sim
    }

    /// Frames applied since creation.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Idle frames seen since creation.
    pub fn idle_count(&self) -> u64 {
        self.idle
    }

    /// Status text from the latest idle frame. Cleared once samples flow again.
    pub fn bridge_message(&self) -> Option<&str> {
        self.bridge_message.as_deref()
    }

    /// Replace the snapshot with the frame's values.
    ///
    /// SimInfo fields missing from the frame keep their previous value, since
    /// bridges send the static block only now and then.
    pub fn apply(&mut self, frame: &TelemetryFrame) {
        self.snapshot = frame.snapshot;
        self.merge_sim(&frame.sim);
        self.bridge_message = None;
        self.accepted += 1;
        trace!("Telemetry #{}: {:?}", self.accepted, self.snapshot);
    }

    /// Record an idle frame without touching telemetry.
    pub fn note_idle(&mut self, message: Option<String>) {
        self.idle += 1;
        if message.is_some() {
            self.bridge_message = message;
        }
    }

    fn merge_sim(&mut self, update: &SimInfo) {
        let sim = &mut self.sim;
        sim.last_lap_ms = update.last_lap_ms.or(sim.last_lap_ms);
        sim.best_lap_ms = update.best_lap_ms.or(sim.best_lap_ms);
        sim.completed_laps = update.completed_laps.or(sim.completed_laps);
        sim.position = update.position.or(sim.position);
        sim.max_rpm = update.max_rpm.or(sim.max_rpm);
        if update.car_model.is_some() {
            sim.car_model.clone_from(&update.car_model);
        }
        if update.track.is_some() {
            sim.track.clone_from(&update.track);
        }
        if update.player_name.is_some() {
            sim.player_name.clone_from(&update.player_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Gear;

    fn frame(speed_kmh: i32, current_time_ms: i64) -> TelemetryFrame {
        TelemetryFrame {
            snapshot: TelemetrySnapshot {
                speed_kmh,
                gear: Gear::Forward(3),
                rpm: 6500,
                throttle: 1.0,
                brake: 0.0,
            },
            current_time_ms,
            sim: SimInfo::default(),
        }
    }

    #[test]
    fn apply_replaces_snapshot() {
        let mut store = TelemetryStore::new();
        store.apply(&frame(143, 45230));
        assert_eq!(store.snapshot().speed_kmh, 143);

        store.apply(&frame(80, 0));
        assert_eq!(store.snapshot().speed_kmh, 80);
        assert_eq!(store.snapshot().rpm, 6500);
        assert_eq!(store.accepted(), 2);
    }

    #[test]
    fn idle_keeps_last_snapshot() {
        let mut store = TelemetryStore::new();
        store.apply(&frame(143, 45230));
        store.note_idle(Some("Waiting for AC".to_string()));

        assert_eq!(store.snapshot().speed_kmh, 143);
        assert_eq!(store.bridge_message(), Some("Waiting for AC"));
        assert_eq!(store.idle_count(), 1);

        store.apply(&frame(150, 46000));
        assert_eq!(store.bridge_message(), None);
    }

    #[test]
    fn sim_info_merges_sparse_updates() {
        let mut store = TelemetryStore::new();

        let mut first = frame(100, 1000);
        first.sim.track = Some("monza".to_string());
        first.sim.position = Some(4);
        store.apply(&first);

        let mut second = frame(110, 2000);
        second.sim.position = Some(3);
        store.apply(&second);

        assert_eq!(store.sim().track.as_deref(), Some("monza"));
        assert_eq!(store.sim().position, Some(3));
    }
}
