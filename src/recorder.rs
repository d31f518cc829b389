//! Captured lap buffer and hand-off to lap storage

use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::storage::LapStore;
use crate::types::{CapturedLap, SessionContext};
use crate::{Result, TimingError};

/// A lap the store refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedLap {
    pub lap: CapturedLap,
    pub reason: String,
}

/// Outcome of one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Laps the store accepted, now gone from the buffer
    pub saved: Vec<CapturedLap>,
    /// Laps the store refused, still buffered
    pub failed: Vec<FailedLap>,
}

impl FlushReport {
    pub fn total(&self) -> usize {
        self.saved.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Laps captured for the active circuit/car pairing, most recent first.
#[derive(Debug, Clone, Default)]
pub struct SessionRecorder {
    context: SessionContext,
    laps: VecDeque<CapturedLap>,
    next_seq: u64,
}

impl SessionRecorder {
    pub fn new(context: SessionContext) -> Self {
        Self { context, laps: VecDeque::new(), next_seq: 1 }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Switch pairing. Laps already captured keep theirs.
    pub fn set_context(&mut self, context: SessionContext) {
        debug!("Recording for {} / {} ({})", context.circuit_id, context.car, context.kind);
        self.context = context;
    }

    /// Record a lap stamped with the current context and time.
    pub fn capture(&mut self, elapsed_ms: u64) -> &CapturedLap {
        let lap = CapturedLap {
            seq: self.next_seq,
            elapsed_ms,
            circuit_id: self.context.circuit_id.clone(),
            car: self.context.car.clone(),
            session_kind: self.context.kind,
            timestamp: Utc::now(),
        };
        self.next_seq += 1;
        self.laps.push_front(lap);
        &self.laps[0]
    }

    /// Captured laps, most recent first.
    pub fn laps(&self) -> impl Iterator<Item = &CapturedLap> {
        self.laps.iter()
    }

    pub fn list(&self) -> Vec<CapturedLap> {
        self.laps.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.laps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.laps.is_empty()
    }

    pub fn clear(&mut self) {
        self.laps.clear();
    }

    /// Submit every buffered lap, oldest first.
    ///
    /// Accepted laps leave the buffer; refused ones stay for the next flush.
    /// Any refusal turns the whole result into [`TimingError::Persistence`],
    /// whose report still lists what was saved. Dropping the future part way
    /// leaves the buffer holding every lap not yet confirmed.
    pub async fn flush(&mut self, store: &dyn LapStore) -> Result<FlushReport> {
        let pending: Vec<CapturedLap> = self.laps.iter().rev().cloned().collect();
        let mut report = FlushReport::default();

        for lap in pending {
            match store.submit(&lap.record()).await {
                Ok(()) => {
                    let seq = lap.seq;
                    self.laps.retain(|kept| kept.seq != seq);
                    report.saved.push(lap);
                }
                Err(e) => {
                    warn!("Lap #{} ({}ms) was not saved: {}", lap.seq, lap.elapsed_ms, e);
                    report.failed.push(FailedLap { lap, reason: e.to_string() });
                }
            }
        }

        if report.is_complete() {
            info!("Saved {} laps", report.saved.len());
            Ok(report)
        } else {
            Err(TimingError::Persistence { report })
        }
    }
}
