//! Timing session: the clock, the latest telemetry and the captured laps

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::Result;
use crate::connection::{BridgeAddress, ConnectionManager, ConnectionState};
use crate::recorder::{FlushReport, SessionRecorder};
use crate::storage::LapStore;
use crate::store::TelemetryStore;
use crate::timing::{ClockState, TimingArbiter};
use crate::types::{CapturedLap, SessionContext, SimInfo, TelemetryFrame, TelemetrySnapshot};

/// Everything a client shows about the session at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimingView {
    pub connection: ConnectionState,
    pub address: Option<BridgeAddress>,
    pub clock: ClockState,
    pub elapsed_ms: u64,
    pub best_ms: Option<u64>,
    pub telemetry: TelemetrySnapshot,
    pub sim: SimInfo,
    pub bridge_message: Option<String>,
    /// Most recent first
    pub laps: Vec<CapturedLap>,
}

/// Routes bridge input and user controls to the clock, store and recorder.
///
/// Connection state lives in [`ConnectionManager`]; the session only hears
/// about it through [`TimingSession::connection_lost`].
#[derive(Debug)]
pub struct TimingSession {
    arbiter: TimingArbiter,
    store: TelemetryStore,
    recorder: SessionRecorder,
}

impl TimingSession {
    pub fn new(tick: Duration, context: SessionContext) -> Self {
        Self {
            arbiter: TimingArbiter::new(tick),
            store: TelemetryStore::new(),
            recorder: SessionRecorder::new(context),
        }
    }

    pub fn clock_state(&self) -> ClockState {
        self.arbiter.state()
    }

    pub fn arbiter(&self) -> &TimingArbiter {
        &self.arbiter
    }

    pub fn telemetry(&self) -> &TelemetryStore {
        &self.store
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn on_frame(&mut self, frame: &TelemetryFrame) {
        self.store.apply(frame);
        self.arbiter.external_time_received(frame.current_time_ms);
    }

    pub fn on_idle(&mut self, message: Option<String>) {
        self.store.note_idle(message);
    }

    pub fn connection_lost(&mut self) {
        self.arbiter.connection_lost();
    }

    pub fn tick(&mut self) -> bool {
        self.arbiter.tick()
    }

    pub fn start(&mut self) -> bool {
        self.arbiter.start()
    }

    pub fn stop(&mut self) -> bool {
        self.arbiter.stop()
    }

    /// Zero the clock and drop every captured lap.
    pub fn reset(&mut self) {
        self.arbiter.reset();
        self.recorder.clear();
        info!("Session reset");
    }

    /// Capture the clock as a lap. `None` when there was nothing to capture.
    pub fn lap(&mut self) -> Option<CapturedLap> {
        let elapsed_ms = self.arbiter.lap()?;
        let lap = self.recorder.capture(elapsed_ms).clone();
        debug!("Recorded lap #{} for {}", lap.seq, lap.circuit_id);
        Some(lap)
    }

    pub fn set_context(&mut self, context: SessionContext) {
        self.recorder.set_context(context);
    }

    pub async fn flush(&mut self, store: &dyn LapStore) -> Result<FlushReport> {
        self.recorder.flush(store).await
    }

    pub fn view(&self, connection: &ConnectionManager) -> TimingView {
        TimingView {
            connection: connection.state(),
            address: connection.address().cloned(),
            clock: self.arbiter.state(),
            elapsed_ms: self.arbiter.elapsed_ms(),
            best_ms: self.arbiter.best_ms(),
            telemetry: self.store.snapshot(),
            sim: self.store.sim().clone(),
            bridge_message: self.store.bridge_message().map(str::to_string),
            laps: self.recorder.list(),
        }
    }
}
