//! Bridge connection lifecycle

use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio::time::error::Elapsed;
use tracing::{debug, info, trace, warn};

use super::address::BridgeAddress;
use super::security::{Remediation, SecurityContext};
use super::transport::{Connector, Link};
use crate::config::BridgeConfig;
use crate::decoder::{self, Decoded};
use crate::types::TelemetryFrame;
use crate::{Result, TimingError};

/// State of the bridge connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Something that happened on the connection.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The open handshake completed; the address is now canonical.
    Opened(BridgeAddress),

    /// A telemetry sample arrived.
    Frame(TelemetryFrame),

    /// The bridge is up but reports no simulator session.
    Idle { message: Option<String> },

    /// The connection ended. Carries `ConnectTimeout`, `ConnectFailed` or
    /// `ConnectionLost`.
    Closed(TimingError),
}

type Attempt =
    Pin<Box<dyn Future<Output = std::result::Result<Result<Box<dyn Link>>, Elapsed>> + Send>>;

struct PendingAttempt {
    address: BridgeAddress,
    started: Instant,
    future: Attempt,
}

/// Owns the transport to one bridge at a time.
///
/// `connect` only validates and installs an attempt; progress is driven by
/// [`ConnectionManager::next_event`], which the session driver polls in its
/// event loop. Releasing an attempt drops its future, and with it the connect
/// timeout, so a superseded attempt can never report anything.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    security: Arc<dyn SecurityContext>,
    port: u16,
    path: String,
    connect_timeout: Duration,

    state: ConnectionState,
    address: Option<BridgeAddress>,
    pending: Option<PendingAttempt>,
    link: Option<Box<dyn Link>>,
}

impl ConnectionManager {
    pub fn new(
        config: &BridgeConfig,
        connector: Arc<dyn Connector>,
        security: Arc<dyn SecurityContext>,
    ) -> Result<Self> {
        let address = config.host.as_deref().map(BridgeAddress::parse).transpose()?;

        Ok(Self {
            connector,
            security,
            port: config.port,
            path: config.path.clone(),
            connect_timeout: config.connect_timeout(),
            state: ConnectionState::Disconnected,
            address,
            pending: None,
            link: None,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Address of the current or last successful connection, or the configured host.
    pub fn address(&self) -> Option<&BridgeAddress> {
        self.address.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Start connecting to `input`, or to the last known address when `None`.
    ///
    /// Address and security checks happen before anything is touched; when they
    /// fail, an existing connection stays up. Otherwise any existing transport is
    /// released before the new attempt is installed.
    pub async fn connect(&mut self, input: Option<&str>) -> Result<()> {
        let address = match input {
            Some(raw) => BridgeAddress::parse(raw)?,
            None => self.address.clone().ok_or_else(|| TimingError::invalid_address(""))?,
        };

        if self.security.is_secure_origin() {
            warn!("Refusing insecure bridge stream from a secure page");
            let page = self.security.page_url();
            return Err(TimingError::MixedContentBlocked {
                remediation: Remediation::switch_to_insecure(page.as_ref()),
            });
        }

        self.release().await;

        let url = address.endpoint(self.port, &self.path);
        info!("Connecting to {}", url);

        let connector = Arc::clone(&self.connector);
        let timeout = self.connect_timeout;
        let future: Attempt =
            Box::pin(async move { tokio::time::timeout(timeout, connector.open(&url)).await });

        self.pending = Some(PendingAttempt { address, started: Instant::now(), future });
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Close the connection or abandon the pending attempt.
    ///
    /// Idempotent. Returns the state before the call.
    pub async fn disconnect(&mut self) -> ConnectionState {
        let previous = self.release().await;
        if previous != ConnectionState::Disconnected {
            info!("Disconnected from bridge");
        }
        previous
    }

    async fn release(&mut self) -> ConnectionState {
        let previous = self.state;

        if let Some(pending) = self.pending.take() {
            debug!("Abandoning connection attempt to {}", pending.address);
        }

        if let Some(mut link) = self.link.take() {
            debug!("Closing previous bridge link");
            link.close().await;
        }

        self.state = ConnectionState::Disconnected;
        previous
    }

    /// Wait for the next connection event.
    ///
    /// Pends forever while disconnected. Cancel safe: dropping the future keeps
    /// any pending attempt and open link in place.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        if let Some(pending) = self.pending.as_mut() {
            let outcome = pending.future.as_mut().await;
            let address = pending.address.clone();
            let elapsed = pending.started.elapsed();
            self.pending = None;
            return self.settle_attempt(address, elapsed, outcome);
        }

        if let Some(link) = self.link.as_mut() {
            loop {
                match link.next_message().await {
                    Some(Ok(text)) => match decoder::decode(&text) {
                        Ok(Decoded::Sample(frame)) => {
                            trace!("Frame: speed={} time={}", frame.snapshot.speed_kmh, frame.current_time_ms);
                            return ConnectionEvent::Frame(frame);
                        }
                        Ok(Decoded::Idle { message }) => {
                            trace!("Bridge idle: {:?}", message);
                            return ConnectionEvent::Idle { message };
                        }
                        Err(e) => {
                            warn!("Dropping bridge frame: {}", e);
                        }
                    },
                    Some(Err(e)) => {
                        warn!("Bridge link failed: {}", e);
                        self.link = None;
                        self.state = ConnectionState::Disconnected;
                        return ConnectionEvent::Closed(as_connection_lost(e));
                    }
                    None => {
                        info!("Bridge closed the connection");
                        self.link = None;
                        self.state = ConnectionState::Disconnected;
                        return ConnectionEvent::Closed(TimingError::connection_lost(
                            "the bridge closed the connection",
                        ));
                    }
                }
            }
        }

        std::future::pending().await
    }

    fn settle_attempt(
        &mut self,
        address: BridgeAddress,
        elapsed: Duration,
        outcome: std::result::Result<Result<Box<dyn Link>>, Elapsed>,
    ) -> ConnectionEvent {
        match outcome {
            Ok(Ok(link)) => {
                info!("Connected to bridge at {} in {:?}", address, elapsed);
                self.link = Some(link);
                self.state = ConnectionState::Connected;
                self.address = Some(address.clone());
                ConnectionEvent::Opened(address)
            }
            Ok(Err(e)) => {
                warn!("Connection to {} failed: {}", address, e);
                self.state = ConnectionState::Disconnected;
                ConnectionEvent::Closed(as_connect_failed(e))
            }
            Err(_) => {
                warn!("Connection to {} timed out after {:?}", address, self.connect_timeout);
                self.state = ConnectionState::Disconnected;
                ConnectionEvent::Closed(TimingError::ConnectTimeout { duration: self.connect_timeout })
            }
        }
    }
}

fn as_connect_failed(error: TimingError) -> TimingError {
    match error {
        TimingError::ConnectFailed { .. } => error,
        other => TimingError::connect_failed_with_source(other.to_string(), Box::new(other)),
    }
}

fn as_connection_lost(error: TimingError) -> TimingError {
    match error {
        TimingError::ConnectionLost { .. } => error,
        other => TimingError::connection_lost_with_source(other.to_string(), Box::new(other)),
    }
}
