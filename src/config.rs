//! Bridge and timing configuration.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```yaml
//! host: 192.168.1.50
//! port: 8000
//! path: /ws
//! connect_timeout_ms: 5000
//! tick_interval_ms: 10
//! page_url: http://192.168.1.10:3000/live-timing
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::connection::PageContext;
use crate::{Result, TimingError};

/// Configuration for a live timing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Bridge host used when `connect` is called without an address
    pub host: Option<String>,

    pub port: u16,

    /// WebSocket path on the bridge
    pub path: String,

    /// How long an open handshake may take before it is abandoned
    pub connect_timeout_ms: u64,

    /// Local stopwatch resolution; the clock advances by this much per tick
    pub tick_interval_ms: u64,

    /// URL of the page hosting the client, if any
    pub page_url: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: Self::DEFAULT_PORT,
            path: "/ws".to_string(),
            connect_timeout_ms: 5000,
            tick_interval_ms: 10,
            page_url: None,
        }
    }
}

impl BridgeConfig {
    pub const DEFAULT_PORT: u16 = 8000;

    /// Parse and validate YAML configuration text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| TimingError::config(format!("YAML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| TimingError::io_error(path, e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(TimingError::config("port must not be 0"));
        }
        if !self.path.starts_with('/') {
            return Err(TimingError::config(format!("path '{}' must start with '/'", self.path)));
        }
        if self.connect_timeout_ms == 0 {
            return Err(TimingError::config("connect_timeout_ms must be positive"));
        }
        if self.tick_interval_ms == 0 {
            return Err(TimingError::config("tick_interval_ms must be positive"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Rate at which the local stopwatch publishes, in Hz.
    pub fn tick_hz(&self) -> f64 {
        1000.0 / self.tick_interval_ms.max(1) as f64
    }

    /// Security context of the hosting page.
    pub fn page_context(&self) -> Result<PageContext> {
        match self.page_url.as_deref() {
            Some(url) => PageContext::parse(url),
            None => Ok(PageContext::native()),
        }
    }
}
