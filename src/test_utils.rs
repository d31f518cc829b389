//! Scripted transport for exercising the connection lifecycle without a network.
//!
//! Each call to [`ScriptedConnector::open`] consumes the next scripted outcome.
//! Accepted links are driven from the test through a [`BridgeHandle`].

#![cfg(test)]

use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::connection::{Connector, Link};
use crate::{Result, TimingError};

/// What the next `open` call does.
pub enum Outcome {
    /// Open immediately with the given link.
    Accept(ScriptedLink),
    /// Fail the handshake.
    Refuse(String),
    /// Never complete the handshake.
    Hang,
}

enum Inbound {
    Text(String),
    Fail(String),
    Close,
}

/// Link whose messages are pushed by a [`BridgeHandle`].
pub struct ScriptedLink {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    closed: Arc<AtomicBool>,
}

/// Test-side control of a [`ScriptedLink`].
#[derive(Clone)]
pub struct BridgeHandle {
    outbound: mpsc::UnboundedSender<Inbound>,
    closed: Arc<AtomicBool>,
}

/// Create a linked pair.
pub fn scripted_link() -> (ScriptedLink, BridgeHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    (
        ScriptedLink { inbound: rx, closed: Arc::clone(&closed) },
        BridgeHandle { outbound: tx, closed },
    )
}

impl BridgeHandle {
    pub fn send_raw(&self, raw: impl Into<String>) {
        let _ = self.outbound.send(Inbound::Text(raw.into()));
    }

    pub fn send(&self, frame: Value) {
        self.send_raw(frame.to_string());
    }

    /// Send a running-simulator frame with the given lap time.
    pub fn send_sample(&self, speed_kmh: f64, current_time_ms: i64) {
        self.send(json!({
            "connected": true,
            "physics": { "speedKmh": speed_kmh, "gear": 4, "rpms": 7200, "gas": 0.9, "brake": 0.0 },
            "graphics": { "iCurrentTime": current_time_ms }
        }));
    }

    pub fn send_idle(&self) {
        self.send(json!({ "connected": false, "message": "Waiting for the simulator..." }));
    }

    /// Simulate a transport error.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.outbound.send(Inbound::Fail(reason.into()));
    }

    /// Simulate the bridge closing the connection.
    pub fn close(&self) {
        let _ = self.outbound.send(Inbound::Close);
    }

    /// Whether the client closed this link.
    pub fn is_closed_by_client(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Link for ScriptedLink {
    async fn next_message(&mut self) -> Option<Result<String>> {
        match self.inbound.recv().await {
            Some(Inbound::Text(text)) => Some(Ok(text)),
            Some(Inbound::Fail(reason)) => Some(Err(TimingError::connection_lost(reason))),
            Some(Inbound::Close) | None => None,
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector replaying scripted outcomes, recording every URL it was asked to open.
#[derive(Default)]
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Outcome>>,
    opened: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(outcomes.into_iter().collect()), opened: Mutex::default() })
    }

    /// Connector with an empty script; every open hangs.
    pub fn idle() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// URLs passed to `open` so far.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Link>> {
        self.opened.lock().unwrap().push(url.to_string());
        let outcome = self.script.lock().unwrap().pop_front();

        match outcome {
            Some(Outcome::Accept(link)) => Ok(Box::new(link)),
            Some(Outcome::Refuse(reason)) => Err(TimingError::connect_failed(reason)),
            Some(Outcome::Hang) | None => std::future::pending().await,
        }
    }
}
