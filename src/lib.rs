//! Live lap timing over a sim-racing telemetry bridge.
//!
//! A small bridge process next to the simulator streams telemetry over a
//! WebSocket. Lapclock connects to it, decodes each frame, and runs a lap
//! clock that follows the simulator's own lap time when one is reported and
//! ticks locally when it is not, so timing carries on through a dropped
//! connection.
//!
//! # Features
//!
//! - **Connection lifecycle**: address normalization, mixed-content pre-check,
//!   5 s connect timeout, clean release before every reconnect
//! - **Dual-source clock**: exactly one of the simulator or the local ticker
//!   drives the clock at any instant
//! - **Lap capture**: laps stamped with circuit, car and session kind, handed
//!   to a pluggable [`LapStore`]
//! - **Streams**: views as a `watch`-backed stream with optional throttling,
//!   plus user-facing [`Notice`]s
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use lapclock::{LiveTiming, SessionContext, SessionKind, UpdateRate, format_lap_time};
//!
//! #[tokio::main]
//! async fn main() -> lapclock::Result<()> {
//!     let timing = LiveTiming::builder()
//!         .context(SessionContext::new("monza", "Ferrari 488 GT3", SessionKind::Race))
//!         .spawn()?;
//!
//!     timing.connect(Some("192.168.1.50")).await?;
//!
//!     let mut views = timing.updates(UpdateRate::Max(10));
//!     while let Some(view) = views.next().await {
//!         println!("{} {:?}", format_lap_time(view.elapsed_ms), view.clock);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
pub mod decoder;
mod error;
mod notice;
#[cfg(test)]
mod test_utils;
pub mod types;

// Connection and session
pub mod connection;
pub mod driver;
pub mod recorder;
pub mod session;
pub mod storage;
pub mod store;
pub mod stream;
pub mod timing;

// Core exports
pub use error::*;
pub use notice::{Notice, NoticeLevel};
pub use types::*;

// Main API exports
pub use config::BridgeConfig;
pub use connection::{BridgeAddress, ConnectionState, PageContext, Remediation, SecurityContext};
pub use driver::{LiveTiming, LiveTimingBuilder};
pub use recorder::{FailedLap, FlushReport, SessionRecorder};
pub use session::{TimingSession, TimingView};
pub use storage::{JsonlLapStore, LapStore, MemoryLapStore};
pub use timing::{ClockState, TimingArbiter, format_lap_time};
