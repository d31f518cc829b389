//! Connection to the simulator bridge.
//!
//! - [`BridgeAddress`] normalizes user or scanned input to a bare host
//! - [`SecurityContext`] reports whether the hosting page blocks insecure streams
//! - [`Connector`] and [`Link`] are the transport seam, [`WsConnector`] the
//!   WebSocket implementation
//! - [`ConnectionManager`] owns the lifecycle: checks, connect, timeout,
//!   frames, close

mod address;
mod manager;
mod security;
mod transport;


pub use address::{BridgeAddress, normalize_host};
pub use manager::{ConnectionEvent, ConnectionManager, ConnectionState};
pub use security::{PageContext, Remediation, SecurityContext};
pub use transport::{Connector, Link, WsConnector};
